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
mod engine;
mod manager;
mod memory_index;
mod task;
mod tile_info;

pub use crate::{
    engine::{DecodedFeature, EngineContext, TileDescriptor},
    manager::{ReadEnvironment, ReadManager},
    memory_index::{MemoryIndex, MemoryTicket},
    tile_info::TileInfo,
};
