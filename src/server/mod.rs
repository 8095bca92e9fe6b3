pub mod guards;
pub mod router;
pub mod routes;

pub use router::{SqlitoState, build_client, sqlito_router};
