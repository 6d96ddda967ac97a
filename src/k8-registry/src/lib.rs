mod codec;
mod context;
mod deployment;
mod error;
mod key;
mod registry;
mod selector;
mod store;
mod strategy;
mod subresource;
mod watch;

pub use self::codec::*;
pub use self::context::CancelHandle;
pub use self::context::CancelSignal;
pub use self::context::RequestContext;
pub use self::deployment::*;
pub use self::error::ErrorKind;
pub use self::error::RegistryError;
pub use self::key::KeyCodec;
pub use self::key::NameSpace;
pub use self::registry::Registry;
pub use self::selector::*;
pub use self::store::ObjectStore;
pub use self::store::Preconditions;
pub use self::strategy::*;
pub use self::subresource::*;
pub use self::watch::WatchItem;
pub use self::watch::WatchStream;

pub use k8_kv_store as kv;
pub use k8_registry_config as config;
pub use k8_types as types;
