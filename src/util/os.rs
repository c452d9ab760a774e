//! Small platform probes. Unix-only, same module-gate idiom the rest of the
//! stack uses for anything that reaches past libc.

#[cfg(unix)]
pub use unix::zmem_available;

#[cfg(not(unix))]
pub fn zmem_available() -> Option<u64> {
    None
}

#[cfg(unix)]
mod unix {
    /// Best-effort query of free physical memory, in bytes. Used once at
    /// startup to clamp `max_memory` (spec §4.1). Returns `None` if the
    /// platform won't answer.
    pub fn zmem_available() -> Option<u64> {
        unsafe {
            let pages = libc::sysconf(libc::_SC_AVPHYS_PAGES);
            let page_size = libc::sysconf(libc::_SC_PAGESIZE);
            if pages < 0 || page_size < 0 {
                None
            } else {
                Some(pages as u64 * page_size as u64)
            }
        }
    }

    #[test]
    fn test_zmem_available_returns_something_sane() {
        let mem = zmem_available().expect("sysconf should work on any unix CI box");
        assert!(mem > 0);
    }
}
