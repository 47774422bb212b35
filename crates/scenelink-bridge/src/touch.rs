//! Contact episode tracking.
//!
//! The worker reports the full contact set every step; scenes want edges: a
//! `Started` event the first step a pair touches and an `Ended` event the
//! first step it no longer does. Each object keeps its current touch set,
//! and the tracker diffs the incoming adjacency against it. Contact records
//! naming a removed object are skipped.
//!
//! Contact normals arrive oriented from the first-listed body toward the
//! second; the tracker hands each side its own correctly-signed normal.

use std::collections::HashMap;

use glam::Vec3;

use scenelink_core::Handle;

use crate::scene::TrackedObject;

/// A contact episode edge, delivered once per episode per side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Started {
        body: Handle,
        other: Handle,
        /// `body`'s linear velocity at the start of contact.
        velocity: Vec3,
        /// `other`'s linear velocity at the start of contact.
        other_velocity: Vec3,
        /// Contact normal as seen from `body`.
        normal: Vec3,
    },
    Ended {
        body: Handle,
        other: Handle,
    },
}

/// Diffs per-step contact sets into touch events. Scratch maps are reused
/// across frames.
#[derive(Default)]
pub struct TouchTracker {
    adjacency: HashMap<Handle, Vec<Handle>>,
    normals: HashMap<(Handle, Handle), Vec3>,
    velocities: HashMap<Handle, Vec3>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one step's contact records into the objects' touch sets,
    /// appending any episode edges to `events`.
    pub fn process(
        &mut self,
        contacts: &[(Handle, Handle, Vec3)],
        objects: &mut HashMap<Handle, TrackedObject>,
        events: &mut Vec<TouchEvent>,
    ) {
        self.adjacency.clear();
        self.normals.clear();
        self.velocities.clear();
        self.velocities
            .extend(objects.iter().map(|(h, o)| (*h, o.linear_velocity)));

        for &(a, b, normal) in contacts {
            self.adjacency.entry(a).or_default().push(b);
            self.adjacency.entry(b).or_default().push(a);
            self.normals.insert((a, b), normal);
            self.normals.insert((b, a), -normal);
        }

        for object in objects.values_mut() {
            let body = object.handle;
            match self.adjacency.get(&body) {
                None => {
                    for other in object.touches.drain() {
                        events.push(TouchEvent::Ended { body, other });
                    }
                }
                Some(current) => {
                    object.touches.retain(|other| {
                        let keep = current.contains(other);
                        if !keep {
                            events.push(TouchEvent::Ended {
                                body,
                                other: *other,
                            });
                        }
                        keep
                    });
                    for &other in current {
                        // a record naming a removed object is skipped
                        let Some(&other_velocity) = self.velocities.get(&other) else {
                            continue;
                        };
                        if object.touches.insert(other) {
                            events.push(TouchEvent::Started {
                                body,
                                other,
                                velocity: self.velocities[&body],
                                other_velocity,
                                normal: self.normals[&(body, other)],
                            });
                        }
                    }
                }
            }
        }
    }
}
