#![allow(non_snake_case)]

// Базовые модули
pub mod consts;
pub mod config;
pub mod error;
pub mod metrics;

// Платформа: факты и адресные константы
pub mod facts;  // src/facts/{mod,host,memory,probe,variant}.rs
pub mod layout;

// Ядро: каталог регионов -> CSV snapshot -> сервис чтения
pub mod catalog;
pub mod serialize;
pub mod service;

// Представление и экспозиция
pub mod render;
pub mod endpoint;
pub mod cli;

// Удобные реэкспорты
pub use catalog::{build_catalog, Mode, Region};
pub use config::{KsegConfig, Style};
pub use error::{QueryError, QueryResult};
pub use facts::{
    resolve_variant, ArchFamily, Capabilities, FactsSource, HostFacts, PlatformFacts,
    StaticFacts, WordWidth,
};
pub use layout::{Layout, Span};
pub use serialize::{serialize, Serializer, Snapshot};
pub use service::{Interrupt, QueryChunk, SnapshotReader, SnapshotService};
