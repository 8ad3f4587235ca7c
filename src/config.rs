use crate::enums::{MouseTool, RendererKind, SortBy, ViewType};

/// Smallest stack that is treated as a volume.
pub const DEFAULT_MIN_VOLUME_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub sort_by: SortBy,
    pub min_volume_frames: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            min_volume_frames: DEFAULT_MIN_VOLUME_FRAMES,
        }
    }
}

impl From<SortBy> for LoadOptions {
    fn from(sort_by: SortBy) -> Self {
        Self {
            sort_by,
            ..Self::default()
        }
    }
}

/// Sensitivities and limits of the interaction tools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSettings {
    /// Pan offsets below this viewport fraction snap back to zero.
    pub pan_dead_zone: f64,
    pub zoom_sensitivity: f64,
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Distance within which the zoom snaps to 1 or to the fitting zoom.
    pub zoom_snap: f64,
    pub window_level_sensitivity: f64,
    pub window_width_sensitivity: f64,
    pub window_width_min: i32,
    pub paging_sensitivity: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            pan_dead_zone: 0.02,
            zoom_sensitivity: 3.0,
            zoom_min: 0.5,
            zoom_max: 5.0,
            zoom_snap: 0.07,
            window_level_sensitivity: 3.0,
            window_width_sensitivity: 5.0,
            window_width_min: 1,
            paging_sensitivity: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub renderer: RendererKind,
    /// View used when a volume is shown with the volume backend.
    pub initial_view: ViewType,
    pub load: LoadOptions,
    pub tools: ToolSettings,
    /// Left button tool. `None` picks paging for stacks, windowing otherwise.
    pub left_tool: Option<MouseTool>,
    pub right_tool: MouseTool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            renderer: RendererKind::default(),
            initial_view: ViewType::default(),
            load: LoadOptions::default(),
            tools: ToolSettings::default(),
            left_tool: None,
            right_tool: MouseTool::Zoom,
        }
    }
}

impl ViewerConfig {
    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_initial_view(mut self, view: ViewType) -> Self {
        self.initial_view = view;
        self
    }

    pub fn with_sort_by(mut self, sort_by: SortBy) -> Self {
        self.load.sort_by = sort_by;
        self
    }

    pub fn with_min_volume_frames(mut self, count: usize) -> Self {
        self.load.min_volume_frames = count;
        self
    }

    pub fn with_tools(mut self, tools: ToolSettings) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_left_tool(mut self, tool: MouseTool) -> Self {
        self.left_tool = Some(tool);
        self
    }

    pub fn with_right_tool(mut self, tool: MouseTool) -> Self {
        self.right_tool = tool;
        self
    }
}
