#![doc = "notebookify-core: conversion and upload pipeline for notebookify."]

//! This crate holds all pipeline logic: the notebook model, output rendering,
//! Markdown conversion, the folder-ID cache, remote folder provisioning and
//! the upload orchestrator. Concrete remote and browser clients live in the
//! `notebookify` binary crate and plug in through the traits in [`contract`].

pub mod batch;
pub mod config;
pub mod contract;
pub mod convert;
pub mod error;
pub mod metadata;
pub mod notebook;
pub mod provision;
pub mod render;
pub mod repo_root;
pub mod snapshot;
pub mod upload;
