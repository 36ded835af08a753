//! stream-util - turn plain functions into composable stream stages
//!
//! Sources, transforms and sinks are plain values implementing
//! [`stage::Stage`]; [`Readable::connect`] chains them. [`concat`] merges
//! several sources, [`consume`] isolates failures of a whole chain and
//! [`to_promise`] bridges a chain's outcome into a single future.

pub mod error;
pub mod stream_configuration;

pub mod deferred;
pub mod stage;
pub mod readable;

pub mod sources;
pub mod transforms;
pub mod sinks;
pub mod concat;
pub mod isolation;
pub mod promise;

pub use concat::concat;
pub use deferred::{Deferred, DeferredState, Resolver};
pub use error::{StreamError, StreamResult};
pub use isolation::{consume, ErrorReporter};
pub use promise::to_promise;
pub use readable::{Downstream, Readable, Transform};
pub use sinks::{to_array, to_object, ToArray, ToObject};
pub use sources::{from_values, read_async, read_sync};
pub use stage::{Outlet, Stage, StageState, StageStream};
pub use stream_configuration::StageConfig;
pub use transforms::{
    filter_async, filter_sync, log_passthrough, log_values, map_async, map_sync,
    parallel_map_async, push_values, through_async, through_sync, ParallelMap,
};
