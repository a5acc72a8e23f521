mod feeds;
mod items;
mod schema;
mod store;
mod types;

pub use schema::Database;
pub use store::{FeedStore, ItemStore};
pub use types::{
    FailureState, Feed, FeedFilter, FeedUpdate, Item, NewItem, RequestOptions, StorageError,
    Validators,
};
