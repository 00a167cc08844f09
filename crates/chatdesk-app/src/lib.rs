// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod ids;
pub mod localize;
pub mod model;
pub mod pointer;
pub mod selector;
pub mod state;

pub use ids::*;
pub use localize::*;
pub use model::*;
pub use pointer::*;
pub use selector::*;
pub use state::*;
