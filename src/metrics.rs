#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    pub row_count: usize,
    pub command_count: usize,
}

/// Render accounting for one center's document.
#[derive(Debug, Clone, Default)]
pub struct GroupMetrics {
    pub key: String,
    pub pages: Vec<PageMetrics>,
    pub row_count: usize,
    pub render_ms: f64,
    pub document_bytes: usize,
}

impl GroupMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub groups: Vec<GroupMetrics>,
    pub total_render_ms: f64,
    pub archive_bytes: usize,
}

impl RunMetrics {
    pub fn page_count(&self) -> usize {
        self.groups.iter().map(GroupMetrics::page_count).sum()
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|group| group.row_count).sum()
    }
}
