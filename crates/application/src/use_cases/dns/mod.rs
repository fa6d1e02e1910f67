mod relay_query;

pub use relay_query::RelayQueryUseCase;
