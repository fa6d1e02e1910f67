pub mod dns;

pub use dns::RelayQueryUseCase;
