//! OpenAPI 3.1 generation from a route table and handler source introspection.
//!
//! Routes are registered explicitly as `(method, path, handler, middlewares)`
//! entries. Handler doc comments supply the operation annotations
//! (`@Summary`, `@Param`, `@Success`, ...), and the type names they mention
//! are resolved against the project's own declarations into JSON Schema.
//!
//! # Architecture
//!
//! 1. [`scanner`] and [`parser`] - find and parse the project's Rust files
//! 2. [`type_index`] - qualified-name index of structs, enums, aliases and constants
//! 3. [`classifier`], [`enums`] and [`attributes`] - type expression shapes,
//!    string enumerations and serde/validation member metadata
//! 4. [`schema_generator`] - the cycle-safe type-to-schema resolver
//! 5. [`routes`] and [`annotations`] - the route table and handler annotations
//! 6. [`openapi_builder`] - operation synthesis and document assembly
//! 7. [`cache`] and [`handlers`] - the long-lived service and its HTTP entry points
//! 8. [`serializer`] and [`validation`] - output and compliance checks
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_routes::{
//!     cache::OpenApiService,
//!     config::GeneratorConfig,
//!     routes::{HttpMethod, RouteEntry, RouteTable},
//!     serializer::serialize_yaml,
//! };
//!
//! let mut table = RouteTable::new();
//! table.add(
//!     RouteEntry::new(HttpMethod::Get, "/users/:id")
//!         .with_source("src/handlers.rs", "get_user")
//!         .with_middleware("jwt_auth"),
//! );
//!
//! let service = OpenApiService::new("./my-service", table, GeneratorConfig::default());
//! let document = service.document(false);
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod annotations;
pub mod attributes;
pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod enums;
pub mod error;
pub mod handlers;
pub mod openapi_builder;
pub mod parser;
pub mod routes;
pub mod scanner;
pub mod schema;
pub mod schema_generator;
pub mod serializer;
pub mod type_index;
pub mod validation;
