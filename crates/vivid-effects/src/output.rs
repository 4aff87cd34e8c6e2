//! Screen output marker.

use vivid_core::{accepts, Context, Inputs, InputSlots, Operator, OutputKind};
use vivid_gpu::TextureHandle;

/// Terminal node of the visual chain.
///
/// Forwards its input texture as its own output, which is what
/// `Chain::output_texture` hands to the host for presentation. Keeping an
/// explicit output operator (instead of selecting an effect directly)
/// makes the presented node visible in the inspector and gives a stable
/// name to point `set_output` at while the upstream graph is rewired.
pub struct Output {
    inputs: InputSlots,
    texture: Option<TextureHandle>,
}

impl Output {
    /// Creates an unconnected output.
    pub fn new() -> Self {
        Self {
            inputs: InputSlots::new().slot("source", accepts::TEXTURE),
            texture: None,
        }
    }

    /// Connects the source texture (builder form).
    pub fn input(mut self, name: &str) -> Self {
        self.inputs.connect(0, name);
        self
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Operator for Output {
    fn type_name(&self) -> &'static str {
        "Output"
    }
    fn output_kind(&self) -> OutputKind {
        OutputKind::Texture
    }
    fn inputs(&self) -> Option<&InputSlots> {
        Some(&self.inputs)
    }
    fn inputs_mut(&mut self) -> Option<&mut InputSlots> {
        Some(&mut self.inputs)
    }
    fn process(&mut self, _ctx: &mut Context, inputs: &Inputs) {
        self.texture = inputs.texture(0);
    }
    fn texture_output(&self) -> Option<TextureHandle> {
        self.texture
    }
}
