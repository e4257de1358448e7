pub mod random;
pub mod seq;

use hotlink_core::ShortCode;

/// Produces candidate short codes.
///
/// Generators never talk to storage. A candidate may already be taken;
/// the service detects that on insert and asks for another one.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}
