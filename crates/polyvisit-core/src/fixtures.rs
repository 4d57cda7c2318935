//! Test fixtures: a small animal hierarchy.
//!
//! ```text
//! Animal implements Named          Named extends Labelled
//! Dog extends Animal implements Pet
//! Cat extends Animal
//! Robot implements Named
//! ```

use crate::domain::{CapabilityDecl, ClassDecl, TypeGraph};
use crate::typed::Visitable;

pub struct Animal {
    pub name: String,
}

pub struct Dog {
    pub animal: Animal,
    pub breed: String,
}

impl Dog {
    pub fn new(name: &str, breed: &str) -> Self {
        Self {
            animal: Animal {
                name: name.to_string(),
            },
            breed: breed.to_string(),
        }
    }
}

pub struct Cat {
    pub animal: Animal,
}

pub struct Robot {
    pub serial: u32,
}

pub enum Named {}
pub enum Labelled {}
pub enum Pet {}

impl Visitable for Animal {}
impl Visitable for Dog {}
impl Visitable for Cat {}
impl Visitable for Robot {}

pub fn animal_graph() -> TypeGraph {
    TypeGraph::new()
        .with_class(ClassDecl::<Animal>::new().implements::<Named>())
        .and_then(|g| g.with_class(ClassDecl::<Dog>::new().extends::<Animal>(|dog| &dog.animal).implements::<Pet>()))
        .and_then(|g| g.with_class(ClassDecl::<Cat>::new().extends::<Animal>(|cat| &cat.animal)))
        .and_then(|g| g.with_class(ClassDecl::<Robot>::new().implements::<Named>()))
        .and_then(|g| g.with_capability(CapabilityDecl::<Named>::new().extends::<Labelled>()))
        .and_then(|g| g.with_capability(CapabilityDecl::<Labelled>::new()))
        .and_then(|g| g.with_capability(CapabilityDecl::<Pet>::new()))
        .unwrap()
}
