// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod ids;
pub mod model;
pub mod panel;
pub mod selector;
pub mod state;
pub mod tags;

pub use ids::*;
pub use model::*;
pub use panel::*;
pub use selector::*;
pub use state::*;
pub use tags::*;
