//! A small built-in rigid-body engine.
//!
//! Deterministic and single-threaded: semi-implicit Euler integration,
//! bounding-volume contact detection with impulse-free positional pushout,
//! kinematic wheel poses, and a positional point-constraint solve. Good
//! enough to run the full bridge headless and in tests; production embeds
//! swap in a real engine behind [`PhysicsEngine`].

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::{Quat, Vec3};

use scenelink_core::{
    ConstraintDesc, ConstraintKind, Handle, ObjectDesc, ShapeDesc, SoftBodyDesc, SoftKind,
    VehicleDesc,
};
use scenelink_protocol::{CommandError, MotorCommand};

use crate::engine::{
    BodyState, ConstraintState, ContactManifold, PhysicsEngine, ShapeCache, WheelState,
};

/// Collision geometry reduced to what the broad-phase-only solver needs.
#[derive(Debug, Clone, Copy, PartialEq)]
enum BasicShape {
    Plane { normal: Vec3, constant: f32 },
    /// Everything else collapses to its local bounding box.
    Aabb { half: Vec3 },
}

fn build_shape(desc: &ShapeDesc) -> BasicShape {
    match desc {
        ShapeDesc::Plane { normal, constant } => BasicShape::Plane {
            normal: normal.normalize_or_zero(),
            constant: *constant,
        },
        ShapeDesc::Box { half_extents } | ShapeDesc::Cylinder { half_extents } => {
            BasicShape::Aabb {
                half: *half_extents,
            }
        }
        ShapeDesc::Sphere { radius } => BasicShape::Aabb {
            half: Vec3::splat(*radius),
        },
        ShapeDesc::Capsule { radius, height } => BasicShape::Aabb {
            half: Vec3::new(*radius, height * 0.5 + radius, *radius),
        },
        ShapeDesc::Cone { radius, height } => BasicShape::Aabb {
            half: Vec3::new(*radius, height * 0.5, *radius),
        },
        ShapeDesc::ConvexHull { points } => BasicShape::Aabb {
            half: bounding_half_extents(points),
        },
        ShapeDesc::ConcaveMesh { triangles } => BasicShape::Aabb {
            half: bounding_half_extents(triangles),
        },
    }
}

fn bounding_half_extents(points: &[f32]) -> Vec3 {
    let mut half = Vec3::ZERO;
    for xyz in points.chunks_exact(3) {
        half = half.max(Vec3::new(xyz[0].abs(), xyz[1].abs(), xyz[2].abs()));
    }
    half
}

struct RigidBody {
    shape: Arc<BasicShape>,
    state: BodyState,
    inv_mass: f32,
    restitution: f32,
    /// Forces accumulated since the last step, cleared after integration.
    force_accum: Vec3,
}

impl RigidBody {
    fn is_dynamic(&self) -> bool {
        self.inv_mass > 0.0
    }
}

struct SoftInstance {
    kind: SoftKind,
    /// Mesh in the report unit layout for `kind`.
    units: Vec<f32>,
    velocity: Vec3,
    dynamic: bool,
    /// Last transform push applied to the mesh as a whole.
    origin: Vec3,
}

struct ConstraintInstance {
    desc: ConstraintDesc,
    motor: Option<MotorCommand>,
    applied_impulse: f32,
}

struct VehicleInstance {
    desc: VehicleDesc,
    steering: Vec<f32>,
    engine_force: Vec<f32>,
    brake: Vec<f32>,
}

/// The built-in engine. Entities live in ordered maps so iteration (and with
/// it report contents) is deterministic for a given command history.
pub struct BasicEngine {
    gravity: Vec3,
    bodies: BTreeMap<Handle, RigidBody>,
    softs: BTreeMap<Handle, SoftInstance>,
    constraints: BTreeMap<Handle, ConstraintInstance>,
    vehicles: BTreeMap<Handle, VehicleInstance>,
    contacts: Vec<ContactManifold>,
    shapes: ShapeCache<BasicShape>,
}

impl BasicEngine {
    pub fn new() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            bodies: BTreeMap::new(),
            softs: BTreeMap::new(),
            constraints: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            contacts: Vec::new(),
            shapes: ShapeCache::new(),
        }
    }

    /// Distinct collision shapes currently cached.
    pub fn cached_shapes(&self) -> usize {
        self.shapes.len()
    }

    fn body_mut(&mut self, handle: Handle) -> Result<&mut RigidBody, CommandError> {
        self.bodies
            .get_mut(&handle)
            .ok_or(CommandError::StaleHandle(handle))
    }

    fn vehicle_wheel(
        &mut self,
        vehicle: Handle,
        wheel: u32,
    ) -> Result<&mut VehicleInstance, CommandError> {
        let instance = self
            .vehicles
            .get_mut(&vehicle)
            .ok_or(CommandError::StaleHandle(vehicle))?;
        if wheel as usize >= instance.desc.wheels.len() {
            return Err(CommandError::WheelOutOfRange { vehicle, wheel });
        }
        Ok(instance)
    }

    fn integrate(&mut self, dt: f32) {
        for body in self.bodies.values_mut() {
            if !body.is_dynamic() {
                continue;
            }
            let accel = self.gravity + body.force_accum * body.inv_mass;
            body.state.linear_velocity += accel * dt;
            body.state.position += body.state.linear_velocity * dt;
            let ang = body.state.angular_velocity;
            if ang != Vec3::ZERO {
                body.state.rotation =
                    (body.state.rotation * Quat::from_scaled_axis(ang * dt)).normalize();
            }
        }
        for soft in self.softs.values_mut() {
            if !soft.dynamic {
                continue;
            }
            soft.velocity += self.gravity * dt;
            let delta = soft.velocity * dt;
            translate_units(soft.kind, &mut soft.units, delta);
        }
        self.drive_vehicles(dt);
        self.solve_constraints(dt);
    }

    fn drive_vehicles(&mut self, dt: f32) {
        for vehicle in self.vehicles.values() {
            let engine: f32 = vehicle.engine_force.iter().sum();
            let brake: f32 = vehicle.brake.iter().sum();
            let Some(chassis) = self.bodies.get_mut(&vehicle.desc.chassis) else {
                continue;
            };
            if !chassis.is_dynamic() {
                continue;
            }
            let forward = chassis.state.rotation * Vec3::NEG_Z;
            chassis.state.linear_velocity += forward * engine * chassis.inv_mass * dt;
            if brake > 0.0 {
                let damping = (brake * chassis.inv_mass * dt).min(1.0);
                chassis.state.linear_velocity *= 1.0 - damping;
            }
        }
    }

    /// Positional solve: pull each constraint's anchors together, splitting
    /// the correction by inverse mass. Motors override velocity along their
    /// driven axis.
    fn solve_constraints(&mut self, dt: f32) {
        let handles: Vec<Handle> = self.constraints.keys().copied().collect();
        for handle in handles {
            let Some(instance) = self.constraints.get(&handle) else {
                continue;
            };
            let desc = instance.desc;
            let motor = instance.motor;

            let Some(a) = self.bodies.get(&desc.body_a) else {
                continue;
            };
            let anchor_a = a.state.position + a.state.rotation * desc.pivot_a;
            let inv_a = a.inv_mass;
            let (anchor_b, inv_b) = match desc.body_b {
                Some(b) => {
                    let Some(b) = self.bodies.get(&b) else {
                        continue;
                    };
                    (b.state.position + b.state.rotation * desc.pivot_b, b.inv_mass)
                }
                None => (desc.pivot_b, 0.0),
            };

            let delta = anchor_b - anchor_a;
            let total = inv_a + inv_b;
            let mut applied = 0.0;
            if matches!(desc.kind, ConstraintKind::Point) && total > 0.0 {
                applied = delta.length() / (total * dt.max(1e-6));
                let per_unit = delta / total;
                if let Some(a) = self.bodies.get_mut(&desc.body_a) {
                    a.state.position += per_unit * a.inv_mass;
                }
                if let Some(bh) = desc.body_b {
                    if let Some(b) = self.bodies.get_mut(&bh) {
                        b.state.position -= per_unit * b.inv_mass;
                    }
                }
            }

            if let Some(motor) = motor {
                self.run_motor(&desc, motor);
            }
            if let Some(instance) = self.constraints.get_mut(&handle) {
                instance.applied_impulse = applied;
            }
        }
    }

    fn run_motor(&mut self, desc: &ConstraintDesc, motor: MotorCommand) {
        let Some(body) = self.bodies.get_mut(&desc.body_a) else {
            return;
        };
        match (desc.kind, motor) {
            (
                ConstraintKind::Hinge { axis_a, .. },
                MotorCommand::HingeEnableMotor {
                    target_velocity, ..
                },
            ) => {
                body.state.angular_velocity = axis_a.normalize_or_zero() * target_velocity;
            }
            (
                ConstraintKind::Slider { axis_a, .. },
                MotorCommand::SliderEnableLinearMotor {
                    target_velocity, ..
                },
            ) => {
                body.state.linear_velocity = axis_a.normalize_or_zero() * target_velocity;
            }
            (
                ConstraintKind::Dof,
                MotorCommand::DofConfigureAngularMotor {
                    axis,
                    target_velocity,
                    ..
                },
            ) => {
                let mut ang = body.state.angular_velocity;
                match axis {
                    0 => ang.x = target_velocity,
                    1 => ang.y = target_velocity,
                    _ => ang.z = target_velocity,
                }
                body.state.angular_velocity = ang;
            }
            _ => {}
        }
    }

    fn detect_contacts(&mut self) {
        self.contacts.clear();
        let handles: Vec<Handle> = self.bodies.keys().copied().collect();
        for (i, &a) in handles.iter().enumerate() {
            for &b in &handles[i + 1..] {
                let (sa, sb) = (&self.bodies[&a], &self.bodies[&b]);
                if !sa.is_dynamic() && !sb.is_dynamic() {
                    continue;
                }
                if let Some((normal, depth)) = contact(
                    &sa.shape,
                    sa.state.position,
                    &sb.shape,
                    sb.state.position,
                ) {
                    self.resolve(a, b, normal, depth);
                    self.contacts.push(ContactManifold {
                        body_a: a,
                        body_b: b,
                        normal,
                        depth,
                    });
                }
            }
        }
    }

    /// Inelastic contact response: separate the pair along the normal and
    /// remove approaching normal velocity, scaled by restitution.
    fn resolve(&mut self, a: Handle, b: Handle, normal: Vec3, depth: f32) {
        let (inv_a, inv_b) = (self.bodies[&a].inv_mass, self.bodies[&b].inv_mass);
        let total = inv_a + inv_b;
        if total <= 0.0 {
            return;
        }
        let push = normal * (depth / total);
        let restitution = self.bodies[&a].restitution.max(self.bodies[&b].restitution);
        if let Some(body) = self.bodies.get_mut(&a) {
            body.state.position -= push * body.inv_mass;
            let vn = body.state.linear_velocity.dot(normal);
            if vn > 0.0 {
                body.state.linear_velocity -= normal * vn * (1.0 + restitution);
            }
        }
        if let Some(body) = self.bodies.get_mut(&b) {
            body.state.position += push * body.inv_mass;
            let vn = body.state.linear_velocity.dot(normal);
            if vn < 0.0 {
                body.state.linear_velocity -= normal * vn * (1.0 + restitution);
            }
        }
    }
}

impl Default for BasicEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Contact between two placed shapes, normal pointing from the first to the
/// second.
fn contact(a: &BasicShape, pos_a: Vec3, b: &BasicShape, pos_b: Vec3) -> Option<(Vec3, f32)> {
    match (a, b) {
        (BasicShape::Plane { normal, constant }, BasicShape::Aabb { half }) => {
            plane_aabb(*normal, *constant, pos_b, *half)
        }
        (BasicShape::Aabb { half }, BasicShape::Plane { normal, constant }) => {
            plane_aabb(*normal, *constant, pos_a, *half).map(|(n, d)| (-n, d))
        }
        (BasicShape::Aabb { half: ha }, BasicShape::Aabb { half: hb }) => {
            aabb_aabb(pos_a, *ha, pos_b, *hb)
        }
        (BasicShape::Plane { .. }, BasicShape::Plane { .. }) => None,
    }
}

/// Normal points from the plane toward the box.
fn plane_aabb(normal: Vec3, constant: f32, center: Vec3, half: Vec3) -> Option<(Vec3, f32)> {
    let support = half.x * normal.x.abs() + half.y * normal.y.abs() + half.z * normal.z.abs();
    let dist = normal.dot(center) - constant;
    let depth = support - dist.abs();
    if depth < 0.0 {
        return None;
    }
    let n = if dist >= 0.0 { normal } else { -normal };
    Some((n, depth))
}

/// Minimum-penetration axis, normal from `a` toward `b`.
fn aabb_aabb(ca: Vec3, ha: Vec3, cb: Vec3, hb: Vec3) -> Option<(Vec3, f32)> {
    let delta = cb - ca;
    let overlap = ha + hb - delta.abs();
    // strict: an exactly-flush pair is separated, not touching
    if overlap.x <= 0.0 || overlap.y <= 0.0 || overlap.z <= 0.0 {
        return None;
    }
    let (axis, depth) = if overlap.x <= overlap.y && overlap.x <= overlap.z {
        (Vec3::X, overlap.x)
    } else if overlap.y <= overlap.z {
        (Vec3::Y, overlap.y)
    } else {
        (Vec3::Z, overlap.z)
    };
    let sign = if axis.dot(delta) >= 0.0 { 1.0 } else { -1.0 };
    Some((axis * sign, depth))
}

/// Expand rest-pose geometry into the report unit layout for `kind`.
fn build_units(kind: SoftKind, vertices: &[f32]) -> Vec<f32> {
    match kind {
        SoftKind::Rope => vertices.to_vec(),
        SoftKind::Cloth => {
            let mut units = Vec::with_capacity(vertices.len() * 2);
            for xyz in vertices.chunks_exact(3) {
                units.extend_from_slice(xyz);
                units.extend_from_slice(&[0.0, 1.0, 0.0]);
            }
            units
        }
        SoftKind::Trimesh => {
            let mut units = Vec::with_capacity(vertices.len() * 2);
            for face in vertices.chunks_exact(9) {
                let p0 = Vec3::new(face[0], face[1], face[2]);
                let p1 = Vec3::new(face[3], face[4], face[5]);
                let p2 = Vec3::new(face[6], face[7], face[8]);
                let n = (p1 - p0).cross(p2 - p0).normalize_or_zero();
                for p in [p0, p1, p2] {
                    units.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z]);
                }
            }
            units
        }
    }
}

/// Shift every position in a unit-layout mesh, leaving normals alone.
fn translate_units(kind: SoftKind, units: &mut [f32], delta: Vec3) {
    let stride = match kind {
        SoftKind::Rope => 3,
        // position + normal pairs
        SoftKind::Cloth | SoftKind::Trimesh => 6,
    };
    for unit in units.chunks_exact_mut(stride) {
        unit[0] += delta.x;
        unit[1] += delta.y;
        unit[2] += delta.z;
    }
}

impl PhysicsEngine for BasicEngine {
    fn add_body(&mut self, desc: &ObjectDesc) -> Result<(), CommandError> {
        if desc.shape.geometry_is_empty() {
            return Err(CommandError::EmptyGeometry(desc.handle));
        }
        let shape = self.shapes.get_or_build(&desc.shape, build_shape);
        let inv_mass = if desc.params.mass > 0.0 {
            1.0 / desc.params.mass
        } else {
            0.0
        };
        self.bodies.insert(
            desc.handle,
            RigidBody {
                shape,
                state: BodyState {
                    position: desc.transform.position,
                    rotation: desc.transform.rotation,
                    linear_velocity: desc.params.linear_velocity,
                    angular_velocity: desc.params.angular_velocity,
                },
                inv_mass,
                restitution: desc.params.restitution,
                force_accum: Vec3::ZERO,
            },
        );
        Ok(())
    }

    fn add_soft_body(&mut self, desc: &SoftBodyDesc) -> Result<(), CommandError> {
        if desc.vertices.is_empty() {
            return Err(CommandError::EmptyGeometry(desc.handle));
        }
        self.softs.insert(
            desc.handle,
            SoftInstance {
                kind: desc.kind,
                units: build_units(desc.kind, &desc.vertices),
                velocity: Vec3::ZERO,
                dynamic: desc.mass > 0.0,
                origin: Vec3::ZERO,
            },
        );
        Ok(())
    }

    fn remove_body(&mut self, handle: Handle) {
        self.bodies.remove(&handle);
        self.softs.remove(&handle);
    }

    fn set_transform(
        &mut self,
        handle: Handle,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    ) -> Result<(), CommandError> {
        // a transform push to a soft body translates its whole mesh
        if let Some(soft) = self.softs.get_mut(&handle) {
            if let Some(position) = position {
                let delta = position - soft.origin;
                translate_units(soft.kind, &mut soft.units, delta);
                soft.origin = position;
                soft.velocity = Vec3::ZERO;
            }
            return Ok(());
        }
        let body = self.body_mut(handle)?;
        if let Some(position) = position {
            body.state.position = position;
        }
        if let Some(rotation) = rotation {
            body.state.rotation = rotation;
        }
        Ok(())
    }

    fn set_linear_velocity(&mut self, handle: Handle, velocity: Vec3) -> Result<(), CommandError> {
        self.body_mut(handle)?.state.linear_velocity = velocity;
        Ok(())
    }

    fn set_angular_velocity(
        &mut self,
        handle: Handle,
        velocity: Vec3,
    ) -> Result<(), CommandError> {
        self.body_mut(handle)?.state.angular_velocity = velocity;
        Ok(())
    }

    fn apply_central_impulse(
        &mut self,
        handle: Handle,
        impulse: Vec3,
    ) -> Result<(), CommandError> {
        let body = self.body_mut(handle)?;
        let inv_mass = body.inv_mass;
        body.state.linear_velocity += impulse * inv_mass;
        Ok(())
    }

    fn apply_impulse(
        &mut self,
        handle: Handle,
        impulse: Vec3,
        point: Vec3,
    ) -> Result<(), CommandError> {
        let body = self.body_mut(handle)?;
        let inv_mass = body.inv_mass;
        body.state.linear_velocity += impulse * inv_mass;
        // crude angular response from the offset lever arm
        let lever = body.state.rotation * point;
        body.state.angular_velocity += lever.cross(impulse) * inv_mass;
        Ok(())
    }

    fn apply_force(&mut self, handle: Handle, force: Vec3, _point: Vec3) -> Result<(), CommandError> {
        self.body_mut(handle)?.force_accum += force;
        Ok(())
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    fn add_constraint(&mut self, desc: &ConstraintDesc) -> Result<(), CommandError> {
        if !self.bodies.contains_key(&desc.body_a) {
            return Err(CommandError::StaleHandle(desc.body_a));
        }
        if let Some(b) = desc.body_b {
            if !self.bodies.contains_key(&b) {
                return Err(CommandError::StaleHandle(b));
            }
        }
        self.constraints.insert(
            desc.handle,
            ConstraintInstance {
                desc: *desc,
                motor: None,
                applied_impulse: 0.0,
            },
        );
        Ok(())
    }

    fn remove_constraint(&mut self, handle: Handle) {
        self.constraints.remove(&handle);
    }

    fn configure_motor(
        &mut self,
        handle: Handle,
        motor: MotorCommand,
    ) -> Result<(), CommandError> {
        let instance = self
            .constraints
            .get_mut(&handle)
            .ok_or(CommandError::StaleHandle(handle))?;
        instance.motor = Some(motor);
        Ok(())
    }

    fn add_vehicle(&mut self, desc: &VehicleDesc) -> Result<(), CommandError> {
        if !self.bodies.contains_key(&desc.chassis) {
            return Err(CommandError::StaleHandle(desc.chassis));
        }
        let wheels = desc.wheels.len();
        self.vehicles.insert(
            desc.handle,
            VehicleInstance {
                desc: desc.clone(),
                steering: vec![0.0; wheels],
                engine_force: vec![0.0; wheels],
                brake: vec![0.0; wheels],
            },
        );
        Ok(())
    }

    fn set_steering(&mut self, vehicle: Handle, wheel: u32, value: f32) -> Result<(), CommandError> {
        let instance = self.vehicle_wheel(vehicle, wheel)?;
        instance.steering[wheel as usize] = value;
        Ok(())
    }

    fn apply_engine_force(
        &mut self,
        vehicle: Handle,
        wheel: u32,
        force: f32,
    ) -> Result<(), CommandError> {
        let instance = self.vehicle_wheel(vehicle, wheel)?;
        instance.engine_force[wheel as usize] = force;
        Ok(())
    }

    fn set_brake(&mut self, vehicle: Handle, wheel: u32, force: f32) -> Result<(), CommandError> {
        let instance = self.vehicle_wheel(vehicle, wheel)?;
        instance.brake[wheel as usize] = force;
        Ok(())
    }

    fn step(&mut self, time_step: f32, max_sub_steps: u32, fixed_time_step: f32) {
        let mut remaining = time_step;
        for _ in 0..max_sub_steps.max(1) {
            if remaining <= 0.0 {
                break;
            }
            let dt = fixed_time_step.min(remaining);
            self.integrate(dt);
            remaining -= dt;
        }
        for body in self.bodies.values_mut() {
            body.force_accum = Vec3::ZERO;
        }
        self.detect_contacts();
    }

    fn body_state(&self, handle: Handle) -> Option<BodyState> {
        self.bodies.get(&handle).map(|b| b.state)
    }

    fn contacts(&self) -> &[ContactManifold] {
        &self.contacts
    }

    fn wheel_state(&self, vehicle: Handle, wheel: usize) -> Option<WheelState> {
        let instance = self.vehicles.get(&vehicle)?;
        let desc = instance.desc.wheels.get(wheel)?;
        let chassis = self.bodies.get(&instance.desc.chassis)?;
        let local = desc.connection_point + desc.direction * desc.suspension_rest_length;
        let position = chassis.state.position + chassis.state.rotation * local;
        let steer_axis = (-desc.direction).normalize_or_zero();
        let steering = instance.steering[wheel];
        let rotation = chassis.state.rotation * Quat::from_axis_angle(steer_axis, steering);
        Some(WheelState { position, rotation })
    }

    fn constraint_state(&self, handle: Handle) -> Option<ConstraintState> {
        let instance = self.constraints.get(&handle)?;
        let body = self.bodies.get(&instance.desc.body_a)?;
        Some(ConstraintState {
            body: instance.desc.body_a,
            anchor_world: body.state.position + body.state.rotation * instance.desc.pivot_a,
            applied_impulse: instance.applied_impulse,
        })
    }

    fn soft_vertices(&self, handle: Handle) -> Option<&[f32]> {
        self.softs.get(&handle).map(|s| s.units.as_slice())
    }
}
