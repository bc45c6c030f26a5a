//! Controllers adapting transport verbs to form sessions and searches.

pub mod collection;
pub mod error;
pub mod resource;
pub mod response;
pub mod simple_form;

pub use collection::{CollectionResource, SessionSetup};
pub use error::ApiError;
pub use resource::{split_ids, ResourceController, DEFAULT_BATCH_LIMIT};
pub use response::ApiReply;
pub use simple_form::{ConfigForm, SimpleForm, SimpleFormFactory, SimpleFormRegistry};
