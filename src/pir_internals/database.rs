/// Read-only storage of a database of 64 -bit words, indexed `0..size()`.
///
/// Implementations must tolerate concurrent reads, since a single server answers many queries in parallel.
pub trait Database: Send + Sync {
    fn size(&self) -> u64;

    /// Returns word at `index`. Callers guarantee `index < self.size()`.
    fn read(&self, index: u64) -> u64;
}

impl Database for [u64] {
    #[inline(always)]
    fn size(&self) -> u64 {
        self.len() as u64
    }

    #[inline(always)]
    fn read(&self, index: u64) -> u64 {
        self[index as usize]
    }
}

impl Database for Vec<u64> {
    #[inline(always)]
    fn size(&self) -> u64 {
        self.as_slice().size()
    }

    #[inline(always)]
    fn read(&self, index: u64) -> u64 {
        self.as_slice().read(index)
    }
}

impl<D: Database + ?Sized> Database for &D {
    #[inline(always)]
    fn size(&self) -> u64 {
        (**self).size()
    }

    #[inline(always)]
    fn read(&self, index: u64) -> u64 {
        (**self).read(index)
    }
}
