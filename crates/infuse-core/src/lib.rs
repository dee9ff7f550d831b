//! Core types and configuration for infuse.
//!
//! This crate defines the asset model ([`Asset`], [`SecretAsset`],
//! [`InjectableAsset`]), the image descriptor and its injection chain
//! ([`Image`], [`InjectionChain`]), the `infuse.toml` schema
//! ([`InfuseConfig`]), and shared error types.

pub mod asset;
pub mod config;
pub mod error;
pub mod image;
pub mod manifest;

pub use asset::{
    Asset, AssetSource, DirectoryAsset, EntryPredicate, InjectableAsset, Owner, Principal,
    SecretAsset, normalize_destination,
};
pub use config::{EngineConfig, InfuseConfig, InjectConfig, StackIdentity};
pub use error::{Error, Result};
pub use image::{BuildSettings, Image, InjectionChain, InjectionRecord, Registry};
pub use manifest::AssetManifest;
