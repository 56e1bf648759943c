/// Prefix window over a filtered list that grows one page at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page: usize,
    page_size: usize,
}

impl PageWindow {
    /// Start on the first page.
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Current page count.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Games per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Length of the visible prefix for a list of `total` items.
    pub fn visible_len(&self, total: usize) -> usize {
        self.page.saturating_mul(self.page_size).min(total)
    }

    /// Visible prefix of `items`.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[..self.visible_len(items.len())]
    }

    /// Whether more items exist beyond the visible prefix.
    pub fn has_more(&self, total: usize) -> bool {
        self.visible_len(total) < total
    }

    /// Called when the rendered window reaches its end; grows by one page if possible.
    pub fn end_reached(&mut self, total: usize) -> bool {
        if self.has_more(total) {
            self.page += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_until_exhausted() {
        let items: Vec<usize> = (0..95).collect();
        let mut window = PageWindow::new(40);
        assert_eq!(window.slice(&items).len(), 40);
        assert!(window.end_reached(items.len()));
        assert_eq!(window.slice(&items).len(), 80);
        assert!(window.end_reached(items.len()));
        assert_eq!(window.slice(&items).len(), 95);
        assert!(!window.end_reached(items.len()));
        assert_eq!(window.page(), 3);
    }

    #[test]
    fn short_lists_are_fully_visible() {
        let window = PageWindow::new(40);
        assert_eq!(window.visible_len(7), 7);
        assert!(!window.has_more(7));
        assert_eq!(PageWindow::new(0).page_size(), 1);
    }
}
