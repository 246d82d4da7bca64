/// A synchronous, random-access byte source the archive reads chunk and
/// entry bytes from.
///
/// Kept deliberately synchronous and non-`async`: the teacher's own
/// `base-io` split is async/tokio-backed for the game's streaming asset
/// loads, but this crate's reads are small, local, and happen under a
/// already-held shader-cache lock in places (§5) where blocking is fine and
/// pulling in an executor would not be.
pub trait ByteSource: Send + Sync {
    fn size(&self) -> u64;

    fn read(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;

    fn read_to_vec(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read(offset, &mut buf)?;
        Ok(buf)
    }
}
