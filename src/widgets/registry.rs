use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::foundation::error::{LayercastError, LayercastResult};
use crate::fonts::catalog::FontStyle;

/// Props passed to a widget, keyed by prop name.
pub type WidgetProps = Map<String, Value>;

/// A font the widget may reference by `name` in its markup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WidgetFont {
    /// Logical family name.
    pub name: String,
    /// Weight from the CSS set `100..=900` in steps of 100.
    pub weight: u16,
    /// Style.
    pub style: FontStyle,
}

/// What a widget sees while rendering.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    /// Layout width in pixels, before any scale.
    pub width: u32,
    /// Layout height in pixels, before any scale.
    pub height: u32,
    /// Every font available to the rasterizer.
    pub fonts: &'a [WidgetFont],
}

/// A renderable visual component.
///
/// Implementations return a self-contained SVG document laid out at `ctx.width x ctx.height`.
pub trait Widget: Send + Sync {
    /// Produce SVG markup for `props`.
    fn render(&self, props: &WidgetProps, ctx: &RenderContext<'_>) -> LayercastResult<String>;
}

impl<F> Widget for F
where
    F: Fn(&WidgetProps, &RenderContext<'_>) -> LayercastResult<String> + Send + Sync,
{
    fn render(&self, props: &WidgetProps, ctx: &RenderContext<'_>) -> LayercastResult<String> {
        self(props, ctx)
    }
}

/// A widget plus its registration metadata.
#[derive(Clone)]
pub struct RegisteredWidget {
    /// Unique name layers refer to.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Props merged underneath caller props.
    pub default_props: WidgetProps,
    /// Width used when the layer gives none.
    pub default_width: Option<u32>,
    /// Height used when the layer gives none.
    pub default_height: Option<u32>,
    widget: Arc<dyn Widget>,
}

impl std::fmt::Debug for RegisteredWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredWidget")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("default_props", &self.default_props)
            .field("default_width", &self.default_width)
            .field("default_height", &self.default_height)
            .finish_non_exhaustive()
    }
}

impl RegisteredWidget {
    /// Registration with no description, no default props and no default size.
    pub fn new(name: impl Into<String>, widget: impl Widget + 'static) -> Self {
        Self {
            name: name.into(),
            description: None,
            default_props: WidgetProps::new(),
            default_width: None,
            default_height: None,
            widget: Arc::new(widget),
        }
    }

    /// Human readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Props that caller props are merged over.
    pub fn with_default_props(mut self, props: WidgetProps) -> Self {
        self.default_props = props;
        self
    }

    /// Layout size used when the layer gives none.
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_width = Some(width);
        self.default_height = Some(height);
        self
    }

    /// The renderer.
    pub fn widget(&self) -> &dyn Widget {
        self.widget.as_ref()
    }
}

/// Name-keyed widget registry, shared across requests. Names are unique; listing keeps
/// registration order.
#[derive(Debug, Default)]
pub struct WidgetRegistry {
    widgets: RwLock<Vec<Arc<RegisteredWidget>>>,
}

impl WidgetRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a widget. A name that is already registered is rejected.
    pub fn register(&self, widget: RegisteredWidget) -> LayercastResult<()> {
        let mut guard = self.widgets.write();
        if guard.iter().any(|w| w.name == widget.name) {
            return Err(LayercastError::validation(format!(
                "widget \"{}\" is already registered",
                widget.name
            )));
        }
        tracing::debug!(name = %widget.name, "registered widget");
        guard.push(Arc::new(widget));
        Ok(())
    }

    /// Registration named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredWidget>> {
        self.widgets.read().iter().find(|w| w.name == name).cloned()
    }

    /// Like [`WidgetRegistry::get`], but a miss names every registered widget.
    pub fn resolve(&self, name: &str) -> LayercastResult<Arc<RegisteredWidget>> {
        self.get(name).ok_or_else(|| LayercastError::WidgetNotFound {
            name: name.to_owned(),
            available: self.names(),
        })
    }

    /// Whether `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.widgets.read().iter().any(|w| w.name == name)
    }

    /// Every registration, in registration order.
    pub fn list(&self) -> Vec<Arc<RegisteredWidget>> {
        self.widgets.read().clone()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.widgets.read().iter().map(|w| w.name.clone()).collect()
    }

    /// Remove a widget; `false` if it was not registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut guard = self.widgets.write();
        let before = guard.len();
        guard.retain(|w| w.name != name);
        guard.len() != before
    }

    /// Remove every registration.
    pub fn clear(&self) {
        self.widgets.write().clear();
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.widgets.read().len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.widgets.read().is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/widgets/registry.rs"]
mod tests;
