//! Host scene-graph interface
//!
//! The host application owns the authoritative scene graph. This module only
//! describes what the mirror consumes from it: object queries, attribute
//! plugs, connections and change-listener registration. Handles are opaque;
//! nothing here interprets them beyond equality and hashing.
//!
//! Notifications arrive as [`HostEvent`] values, each tagged with the
//! subscription it fired through so the coordinator can reject callbacks it
//! never asked for.

pub mod memory;

use bitflags::bitflags;
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::mesh::MeshGeometry;

/// Opaque identifier of an object in the host scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalHandle(pub u64);

/// Opaque handle returned by the host when a listener is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Host object categories the mirror cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Polygon mesh shape
    Mesh,
    /// Light shape
    Light,
    /// Camera shape
    Camera,
    /// Shading group binding a surface shader to geometry
    ShadingGroup,
}

/// What a listener waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Scene-wide: an object was created
    ObjectAdded,
    /// Scene-wide: an object was deleted
    ObjectRemoved,
    /// Scene-wide: a plug connection was made or broken
    ConnectionChanged,
    /// One-shot: the object's attributes became queryable
    Ready,
    /// Persistent: transform or attribute data of one object changed
    AttributeChanged,
}

impl ListenerKind {
    /// Scene-wide listeners are registered without a target object
    pub fn is_scene_wide(self) -> bool {
        matches!(
            self,
            ListenerKind::ObjectAdded
                | ListenerKind::ObjectRemoved
                | ListenerKind::ConnectionChanged
        )
    }
}

bitflags! {
    /// Which parts of an object an attribute notification touched
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeFlags: u32 {
        /// Local matrix
        const TRANSFORM = 1 << 0;
        /// Mesh topology or vertex attributes
        const GEOMETRY = 1 << 1;
        /// Light, camera or shader parameters
        const PARAMETERS = 1 << 2;
        /// Parent changed
        const HIERARCHY = 1 << 3;
    }
}

/// Payload of a host notification
#[derive(Debug, Clone, PartialEq)]
pub enum HostEventKind {
    /// An object was created
    ObjectAdded {
        /// New object
        handle: ExternalHandle,
    },
    /// An object was deleted
    ObjectRemoved {
        /// Deleted object
        handle: ExternalHandle,
    },
    /// A connection from `source` into `destination` was made or broken
    Connection {
        /// Upstream side of the connection
        source: ExternalHandle,
        /// Downstream side of the connection
        destination: ExternalHandle,
        /// `true` when made, `false` when broken
        made: bool,
    },
    /// An object reported earlier is now queryable
    Ready {
        /// Object that became ready
        handle: ExternalHandle,
    },
    /// Attributes of an object changed
    AttributeChanged {
        /// Object whose data changed
        handle: ExternalHandle,
        /// What changed
        changes: ChangeFlags,
    },
}

/// A notification delivered by the host dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    /// Subscription the notification fired through
    pub subscription: SubscriptionId,
    /// What happened
    pub kind: HostEventKind,
}

/// Value read from a host attribute plug
#[derive(Debug, Clone, PartialEq)]
pub enum PlugValue {
    /// Scalar attribute
    Float(f32),
    /// Three-component color or vector attribute
    Color([f32; 3]),
    /// String attribute
    Text(String),
    /// Boolean attribute
    Bool(bool),
    /// Integer attribute
    Int(i32),
}

impl PlugValue {
    /// Scalar view; integers and booleans widen, colors do not
    pub fn as_float(&self) -> Option<f32> {
        match self {
            PlugValue::Float(value) => Some(*value),
            PlugValue::Int(value) => Some(*value as f32),
            PlugValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Color view; scalars broadcast to all three channels
    pub fn as_color(&self) -> Option<[f32; 3]> {
        match self {
            PlugValue::Color(value) => Some(*value),
            PlugValue::Float(value) => Some([*value; 3]),
            _ => None,
        }
    }

    /// String view
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PlugValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Light categories mirrored from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Omni-directional light with a position
    Point,
    /// Cone light with a position and direction
    Spot,
    /// Infinitely distant light with only a direction
    Directional,
}

/// Raw light data as the host stores it
#[derive(Debug, Clone, PartialEq)]
pub struct LightAttributes {
    /// Light category
    pub light_type: LightType,
    /// Linear color, not yet scaled by intensity
    pub color: [f32; 3],
    /// Scalar intensity
    pub intensity: f32,
    /// Full cone angle in radians (spot lights)
    pub cone_angle: f32,
    /// Penumbra angle in radians (spot lights)
    pub penumbra_angle: f32,
}

/// Raw camera data as the host stores it
#[derive(Debug, Clone, PartialEq)]
pub struct CameraAttributes {
    /// Vertical field of view in radians
    pub vertical_fov: f32,
    /// Near clip distance
    pub near_clip: f32,
    /// Far clip distance
    pub far_clip: f32,
}

/// Host query failures
///
/// These are expected at runtime (objects disappear, attributes are missing)
/// and are logged by the caller rather than treated as bugs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// Handle does not name a live object
    #[error("object {0:?} does not exist")]
    MissingObject(ExternalHandle),
    /// Object exists but lacks the attribute
    #[error("object {handle:?} has no attribute '{name}'")]
    MissingAttribute {
        /// Queried object
        handle: ExternalHandle,
        /// Attribute or plug name
        name: String,
    },
    /// Plug holds a value of another type
    #[error("plug '{plug}' on {handle:?} is not a {expected}")]
    PlugType {
        /// Queried object
        handle: ExternalHandle,
        /// Plug name
        plug: String,
        /// Expected value type
        expected: &'static str,
    },
    /// Object was reported but cannot be queried yet
    #[error("object {0:?} is not queryable yet")]
    NotReady(ExternalHandle),
    /// Host refused to register a listener
    #[error("listener registration refused for {0:?}")]
    ListenerRefused(Option<ExternalHandle>),
}

/// Listener registration half of the host interface
pub trait ListenerHost {
    /// Register a listener; scene-wide kinds take `None` as target
    fn register_listener(
        &mut self,
        target: Option<ExternalHandle>,
        kind: ListenerKind,
    ) -> Result<SubscriptionId, HostError>;

    /// Cancel a listener; unknown ids are ignored
    fn cancel_listener(&mut self, id: SubscriptionId);
}

/// Query half of the host interface
pub trait HostScene: ListenerHost {
    /// All live objects of one kind
    fn enumerate(&self, kind: ObjectKind) -> Vec<ExternalHandle>;

    /// Category of an object, if it is one the mirror tracks
    fn object_kind(&self, handle: ExternalHandle) -> Option<ObjectKind>;

    /// Host node type name (`"lambert"`, `"file"`, ...)
    fn type_name(&self, handle: ExternalHandle) -> Option<String>;

    /// Intermediate objects are construction-history shapes that never render
    fn is_intermediate(&self, handle: ExternalHandle) -> bool;

    /// Orthographic cameras
    fn is_orthographic(&self, handle: ExternalHandle) -> bool;

    /// Local matrix of an object relative to its parent
    fn local_transform(&self, handle: ExternalHandle) -> Result<Mat4, HostError>;

    /// Hierarchy parent
    fn parent(&self, handle: ExternalHandle) -> Option<ExternalHandle>;

    /// Hierarchy children in host order
    fn children(&self, handle: ExternalHandle) -> Vec<ExternalHandle>;

    /// Attribute arrays and triangulated faces of a mesh
    fn mesh_geometry(&self, handle: ExternalHandle) -> Result<MeshGeometry, HostError>;

    /// Light parameters
    fn light_attributes(&self, handle: ExternalHandle) -> Result<LightAttributes, HostError>;

    /// Camera parameters
    fn camera_attributes(&self, handle: ExternalHandle) -> Result<CameraAttributes, HostError>;

    /// Value of a named plug
    fn plug_value(&self, handle: ExternalHandle, plug: &str) -> Result<PlugValue, HostError>;

    /// Nodes connected into one plug of `handle`
    fn plug_sources(&self, handle: ExternalHandle, plug: &str) -> Vec<ExternalHandle>;

    /// Nodes connected into any plug of `handle`
    fn input_nodes(&self, handle: ExternalHandle) -> Vec<ExternalHandle>;

    /// Surface shader connected to a shading group
    fn surface_shader(&self, group: ExternalHandle) -> Option<ExternalHandle>;

    /// Shading groups a mesh is a member of
    fn shading_groups_of(&self, mesh: ExternalHandle) -> Vec<ExternalHandle>;

    /// Meshes that are members of a shading group
    fn shading_group_members(&self, group: ExternalHandle) -> Vec<ExternalHandle>;

    /// Next queued notification, for hosts that buffer them
    fn poll_event(&mut self) -> Option<HostEvent> {
        None
    }
}
