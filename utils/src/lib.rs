pub mod hex {
    /// Hex rendering for byte containers, used by `Debug` impls of script-bearing types
    pub trait ToHex {
        fn to_hex(&self) -> String;
    }

    impl ToHex for Vec<u8> {
        fn to_hex(&self) -> String {
            hex::encode(self)
        }
    }

    impl ToHex for [u8] {
        fn to_hex(&self) -> String {
            hex::encode(self)
        }
    }
}

pub mod mem_size {
    /// Approximate heap plus inline footprint, used by byte-bounded caches
    pub trait MemSizeEstimator {
        fn estimate_mem_bytes(&self) -> usize {
            std::mem::size_of_val(self)
        }
    }

    impl MemSizeEstimator for Vec<u8> {
        fn estimate_mem_bytes(&self) -> usize {
            std::mem::size_of::<Self>() + self.capacity()
        }
    }

    impl MemSizeEstimator for u64 {}
}
