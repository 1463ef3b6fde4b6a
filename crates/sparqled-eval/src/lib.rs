//! Sparqled evaluation
//!
//! Executes recommendation queries against a SPARQL endpoint and measures the
//! popularity of the returned candidates.

pub mod endpoint;
pub mod popularity;
pub mod results;

pub use endpoint::{Endpoint, EndpointConfig, EndpointError, HttpEndpoint};
pub use popularity::{
    measure, popularity_template, rank_candidates, values_block, Candidate, Measurement,
    RankError, TOP_K,
};
pub use results::{Binding, RdfValue, SparqlResults, ValueKind};
