/*!
# meshpick

Incremental element buffers and cursor hit-testing for multi-mesh editors.

An editor holds many independently edited meshes. **meshpick** flattens
them into scene-wide vertex, line and face arrays, keeps one bit-packed
flag word per element (hierarchy, selection, hover, culling, hidden) and
answers, every frame, "which element is under the cursor?".

* Edits are reported with `notify_*` calls and coalesced into a single dirty
  level per frame; only the work that level implies is re-run.
* Projection, back-face culling and hit-testing run as wgpu compute shaders
  when an adapter is available, and on the CPU otherwise. Both produce the
  same results.
* Nearest candidates are chosen by NDC depth, then combined by selection
  mode priority: vertex, then edge or aux line, then face.

```no_run
use meshpick::prelude::*;

let model = SceneModel::new(vec![EditMesh::new(
    0,
    vec![Vec3::ZERO, Vec3::X, Vec3::Y],
    vec![vec![0, 1, 2]],
)]);
let selection = SelectionState::new(SelectMode::VERTEX | SelectMode::FACE);
let camera = ViewCamera::default();
let cursor = CursorInput::at(Vec2::new(400.0, 300.0));

let mut picking = PickingSystem::new(PickingConfig::default());
let hits = picking.process_frame(&FrameInput {
    model: Some(&model),
    selection: &selection,
    camera: &camera,
    cursor: &cursor,
});

if let Some(hovered) = hits.hovered {
    let (mesh, local) = picking.global_to_local(hovered.kind, hovered.index).unwrap();
    println!("{:?} {local} of mesh {mesh}", hovered.kind);
}
```
*/
#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]

#[macro_use]
extern crate bitflags;
#[cfg(feature = "serde")]
extern crate serde;

pub use glamx;

pub mod buffer;
pub mod compute;
pub mod context;
pub mod error;
pub mod flags;
pub mod model;
pub mod system;
pub mod update;

pub mod prelude {
    pub use crate::buffer::*;
    pub use crate::compute::{BackendKind, BackendPreference, HitResult};
    pub use crate::context::*;
    pub use crate::error::*;
    pub use crate::flags::*;
    pub use crate::model::*;
    pub use crate::system::*;
    pub use crate::update::*;
    pub use glamx::{Mat4, Vec2, Vec3, Vec4};
}
