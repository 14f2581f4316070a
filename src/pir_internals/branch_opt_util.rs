/// Marks the calling path as unlikely to be taken, so that the optimizer lays out the other path first.
#[cold]
#[inline]
pub fn cold() {}

#[inline(always)]
pub fn likely(b: bool) -> bool {
    if !b {
        cold()
    }
    b
}

#[inline(always)]
pub fn unlikely(b: bool) -> bool {
    if b {
        cold()
    }
    b
}
