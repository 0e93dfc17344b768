//! Execution of selection sets over response data or cache records.
//!
//! The same [`GraphQLExecutor`] walk serves every use: the [`ExecutionSource`] decides where
//! values come from (a response with [`JsonSource`], the normalized cache with
//! [`CacheSource`]), the [`ResultAccumulator`] decides what is built ([`DataDict`]s, records,
//! or the set of cache keys that were read).

mod accumulator;
mod data_dict;
mod executor;
mod possibly_deferred;
mod result;
mod source;

pub use accumulator::DataDictMapper;
pub use accumulator::DependencyTracker;
pub use accumulator::MissingValuePolicy;
pub use accumulator::ResultAccumulator;
pub use accumulator::ResultNormalizer;
pub use accumulator::Zip2Accumulator;
pub use data_dict::DataDict;
pub use data_dict::DataValue;
pub use data_dict::FromDataDict;
pub use executor::FieldExecutionInfo;
pub use executor::GraphQLExecutor;
pub use executor::ObjectExecutionInfo;
pub use possibly_deferred::lazily_evaluate_all;
pub use possibly_deferred::PossiblyDeferred;
pub use result::GraphQLResult;
pub use result::ResultSource;
pub use source::CacheSource;
pub use source::DataDictSource;
pub use source::ExecutionSource;
pub use source::JsonSource;
pub use source::ResolvedValue;
