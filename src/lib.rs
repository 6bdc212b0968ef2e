/*!
# Technical Proposal Builder

Generates customer-specific technical proposals as `.docx` documents from a
library of pre-authored template fragments.

## Overview

A user fills in a short form (customer name, project name, an optional
customer logo, an optional network topology diagram, a free-text design
description) and picks the technologies and hardware models the proposal
should cover. The builder stitches the matching fragments together behind a
master cover section, substitutes the placeholders in every section, writes
the result to the output directory and records the submission in a JSON
history file.

## Architecture

### Core
- **Placeholder engine** (`placeholder`) - Replaces literal marker strings
  with text, or with an inline picture, across paragraphs and nested tables
- **Assembler** (`assembler`) - Loads the master and each fragment, applies
  the engine and concatenates them in a fixed order:
  master, technologies, Design, models
- **Proposal service** (`proposal`) - Validation, output file naming,
  saving and history bookkeeping around the assembler

### `.docx` layer (`docx`)
- Zip package, content types and relationships
- Typed body model (paragraphs, runs, tables, cells)
- Picture embedding and document composition

### Front ends
- **Web** (`app`, feature `web`) - Form page plus a small JSON API
- **CLI** (`proposal` binary) - Build, list history, show the catalog

### Support
- **config**: TOML configuration with defaults for every setting
- **upload**: Size/type checks and self-deleting temporary image files
- **history**: Append-only submission store
- **error**: Error types for every layer

## Assembly Rules

- The master template is mandatory; failing to load it, or to place the
  logo in it, aborts the proposal
- Any other fragment that fails is skipped, the rest are still appended and
  the skipped ids are reported
- Uploaded images never outlive the request that carried them

## REST API Endpoints

- `GET /` - Proposal form
- `POST /api/proposals` - Create a proposal from multipart form data
- `GET /api/submissions` - Submission history
- `GET /files/{name}` - Download a generated proposal
*/

pub mod assembler;
pub mod config;
pub mod docx;
pub mod error;
pub mod history;
pub mod placeholder;
pub mod proposal;
pub mod upload;

#[cfg(feature = "web")]
pub mod app;

pub use assembler::{Assembled, Assembler, AssemblyRequest, FileSystemSource, MissingFragment, TemplateSource};
pub use config::ProposalConfig;
pub use error::*;
pub use history::{HistoryStore, SubmissionRecord};
pub use proposal::{ProposalBuilder, ProposalReport, output_filename};
pub use upload::{ScopedImage, UploadPolicy};
