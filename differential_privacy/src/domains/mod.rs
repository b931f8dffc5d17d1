//
// Copyright 2024 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Domains describe the set of legal values at a point in a pipeline.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;

use crate::core::Domain;
use crate::error::Fallible;
use crate::traits::CheckAtom;

/// The domain of all well-formed values of an atomic type.
///
/// For floating-point types, NaN is not a member.
pub struct AtomDomain<T: CheckAtom> {
    _marker: PhantomData<T>,
}

impl<T: CheckAtom> AtomDomain<T> {
    pub fn new() -> Self {
        AtomDomain { _marker: PhantomData }
    }
}

impl<T: CheckAtom> Default for AtomDomain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CheckAtom> Clone for AtomDomain<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: CheckAtom> PartialEq for AtomDomain<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T: CheckAtom> Debug for AtomDomain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomDomain({})", std::any::type_name::<T>())
    }
}

impl<T: CheckAtom> Domain for AtomDomain<T> {
    type Carrier = T;

    fn member(&self, val: &Self::Carrier) -> Fallible<bool> {
        Ok(val.check_member())
    }
}

/// The domain of vectors whose elements are members of an element domain,
/// optionally restricted to a known length.
#[derive(Clone, PartialEq)]
pub struct VectorDomain<D: Domain> {
    pub element_domain: D,
    pub size: Option<usize>,
}

impl<D: Domain> VectorDomain<D> {
    pub fn new(element_domain: D) -> Self {
        VectorDomain { element_domain, size: None }
    }

    /// Restricts the domain to vectors of exactly `size` elements.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

impl<D: Domain + Default> Default for VectorDomain<D> {
    fn default() -> Self {
        Self::new(D::default())
    }
}

impl<D: Domain> Debug for VectorDomain<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "VectorDomain({:?}, size={size})", self.element_domain),
            None => write!(f, "VectorDomain({:?})", self.element_domain),
        }
    }
}

impl<D: Domain> Domain for VectorDomain<D> {
    type Carrier = Vec<D::Carrier>;

    fn member(&self, val: &Self::Carrier) -> Fallible<bool> {
        if self.size.is_some_and(|size| size != val.len()) {
            return Ok(false);
        }
        for elem in val {
            if !self.element_domain.member(elem)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// The domain of hash maps whose keys and values are members of the key and
/// value domains. Used for keyed aggregates such as histograms.
#[derive(Clone, PartialEq)]
pub struct MapDomain<DK: Domain, DV: Domain>
where
    DK::Carrier: Eq + Hash,
{
    pub key_domain: DK,
    pub value_domain: DV,
}

impl<DK: Domain, DV: Domain> MapDomain<DK, DV>
where
    DK::Carrier: Eq + Hash,
{
    pub fn new(key_domain: DK, value_domain: DV) -> Self {
        MapDomain { key_domain, value_domain }
    }
}

impl<DK: Domain + Default, DV: Domain + Default> Default for MapDomain<DK, DV>
where
    DK::Carrier: Eq + Hash,
{
    fn default() -> Self {
        Self::new(DK::default(), DV::default())
    }
}

impl<DK: Domain, DV: Domain> Debug for MapDomain<DK, DV>
where
    DK::Carrier: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapDomain({:?}, {:?})", self.key_domain, self.value_domain)
    }
}

impl<DK: Domain, DV: Domain> Domain for MapDomain<DK, DV>
where
    DK::Carrier: Eq + Hash,
{
    type Carrier = HashMap<DK::Carrier, DV::Carrier>;

    fn member(&self, val: &Self::Carrier) -> Fallible<bool> {
        for (key, value) in val {
            if !self.key_domain.member(key)? || !self.value_domain.member(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_membership() {
        let domain = AtomDomain::<f64>::new();
        assert!(domain.member(&0.0).unwrap());
        assert!(domain.member(&f64::INFINITY).unwrap());
        assert!(!domain.member(&f64::NAN).unwrap());

        let domain = AtomDomain::<i32>::new();
        assert!(domain.member(&i32::MAX).unwrap());
    }

    #[test]
    fn vector_membership() {
        let domain = VectorDomain::new(AtomDomain::<f64>::new());
        assert!(domain.member(&vec![1.0, 2.0]).unwrap());
        assert!(!domain.member(&vec![1.0, f64::NAN]).unwrap());
        assert!(domain.member(&vec![]).unwrap());
    }

    #[test]
    fn sized_vector_membership() {
        let domain = VectorDomain::new(AtomDomain::<i32>::new()).with_size(2);
        assert!(domain.member(&vec![1, 2]).unwrap());
        assert!(!domain.member(&vec![1]).unwrap());
        assert_ne!(domain, VectorDomain::new(AtomDomain::<i32>::new()));
    }

    #[test]
    fn map_membership() {
        let domain = MapDomain::new(AtomDomain::<String>::new(), AtomDomain::<f64>::new());
        let mut data = HashMap::new();
        data.insert("A".to_string(), 1.0);
        assert!(domain.member(&data).unwrap());
        data.insert("B".to_string(), f64::NAN);
        assert!(!domain.member(&data).unwrap());
    }

    #[test]
    fn structural_equality() {
        assert_eq!(AtomDomain::<f64>::new(), AtomDomain::<f64>::new());
        assert_eq!(
            VectorDomain::new(AtomDomain::<i32>::new()),
            VectorDomain::new(AtomDomain::<i32>::new())
        );
    }
}
