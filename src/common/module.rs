//! Identifiers for the four swerve modules and a fixed-size map keyed by them.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Position of a swerve module on the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleId {
    FrontLeft,
    FrontRight,
    BackLeft,
    BackRight,
}

impl ModuleId {
    /// All modules in their canonical order.
    pub const ALL: [ModuleId; 4] = [
        ModuleId::FrontLeft,
        ModuleId::FrontRight,
        ModuleId::BackLeft,
        ModuleId::BackRight,
    ];

    pub fn index(self) -> usize {
        match self {
            ModuleId::FrontLeft => 0,
            ModuleId::FrontRight => 1,
            ModuleId::BackLeft => 2,
            ModuleId::BackRight => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModuleId::FrontLeft => "front_left",
            ModuleId::FrontRight => "front_right",
            ModuleId::BackLeft => "back_left",
            ModuleId::BackRight => "back_right",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per swerve module.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModuleMap<T> {
    values: [T; 4],
}

impl<T> ModuleMap<T> {
    /// Build a map from values given in [`ModuleId::ALL`] order.
    pub fn new(front_left: T, front_right: T, back_left: T, back_right: T) -> Self {
        ModuleMap {
            values: [front_left, front_right, back_left, back_right],
        }
    }

    pub fn from_fn(mut f: impl FnMut(ModuleId) -> T) -> Self {
        ModuleMap {
            values: ModuleId::ALL.map(&mut f),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &T)> {
        ModuleId::ALL.into_iter().zip(self.values.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ModuleId, &mut T)> {
        ModuleId::ALL.into_iter().zip(self.values.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(ModuleId, &T) -> U) -> ModuleMap<U> {
        ModuleMap::from_fn(|id| f(id, &self.values[id.index()]))
    }
}

impl<T> Index<ModuleId> for ModuleMap<T> {
    type Output = T;

    fn index(&self, id: ModuleId) -> &T {
        &self.values[id.index()]
    }
}

impl<T> IndexMut<ModuleId> for ModuleMap<T> {
    fn index_mut(&mut self, id: ModuleId) -> &mut T {
        &mut self.values[id.index()]
    }
}
