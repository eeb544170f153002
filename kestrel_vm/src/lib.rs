//! Dynamic dispatch for Kestrel.
//!
//! This crate provides:
//! - The resolver contract the host type system implements
//! - One binder per dynamic operation kind, with deferral and error synthesis
//! - The per-runtime dispatch cache sharing binders across call sites
//! - Call sites with a local polymorphic rule cache
//! - Runtime configuration and the [`Runtime`] facade

pub mod binder;
pub mod call_site;
pub mod config;
pub mod context;
pub mod dispatch_cache;
pub mod error_fragment;
pub mod operator;
pub mod resolver;
pub mod runtime;
pub mod shape;

pub use binder::{Binder, Binding, Deferral, OperationKind};
pub use call_site::{CallSite, POLY_RULE_LIMIT, SiteClassification};
pub use config::RuntimeConfig;
pub use context::RuntimeContext;
pub use dispatch_cache::DispatchCache;
pub use operator::{BinaryOperator, UnaryOperator};
pub use resolver::{MemberRead, MemberWrite, ResolveError, ResolveResult, Resolver};
pub use runtime::Runtime;
pub use shape::{BinaryKey, CallShape, InvokeMemberKey, MemberKey};
