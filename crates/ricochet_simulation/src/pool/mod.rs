//! Object pooling: `GenericPool<T>` + `PoolRegistry`.
//!
//! Пул — единственный мутатор своего Available/Active partition.
//! Всё взаимодействие снаружи — через `acquire` / `release`.

pub mod generic;
pub mod registry;


pub use generic::{
    EntryState, GenericPool, PoolConfig, PoolHandle, PoolId, PoolStats, Poolable, Prototype,
};
pub use registry::{PoolRegistry, PrototypeId};
