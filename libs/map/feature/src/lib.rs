// This file is part of Meridian.
//
// Meridian is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Meridian is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with Meridian.  If not, see <http://www.gnu.org/licenses/>.
pub mod encode;

mod parsed;
mod state;
mod wire;

pub use crate::{
    parsed::{GeomType, LoadContext, ParsedFeature},
    state::FeatureState,
};

/// Scale sentinel: the finest geometry the feature carries.
pub const BEST_GEOMETRY: i32 = -1;
/// Scale sentinel: the coarsest geometry the feature carries.
pub const WORST_GEOMETRY: i32 = -2;
