use crate::storage::page::{PageId, PageRef};
use std::collections::{HashMap, VecDeque};

/// Capacity-bounded page map plus the order in which pages are offered for
/// eviction.
///
/// The front of `order` is the first eviction candidate; hits and inserts
/// move a page to the back. This is the "skip dirty, prefer oldest clean"
/// policy, not a strict LRU: eviction rotates dirty pages to the back.
#[derive(Debug)]
pub struct PageCache {
    pages: HashMap<PageId, PageRef>,
    order: VecDeque<PageId>,
    capacity: usize,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.pages.len() >= self.capacity
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    /// Looks up a page and marks it most recently used.
    pub fn get(&mut self, page_id: PageId) -> Option<PageRef> {
        let page = self.pages.get(&page_id).cloned()?;
        self.move_to_back(page_id);
        Some(page)
    }

    /// Looks up a page without touching the eviction order.
    pub fn peek(&self, page_id: PageId) -> Option<&PageRef> {
        self.pages.get(&page_id)
    }

    /// Inserts or replaces a page as most recently used. The caller makes
    /// room first; this never evicts.
    pub fn insert(&mut self, page_id: PageId, page: PageRef) {
        if self.pages.insert(page_id, page).is_some() {
            self.move_to_back(page_id);
        } else {
            self.order.push_back(page_id);
        }
    }

    pub fn remove(&mut self, page_id: PageId) -> Option<PageRef> {
        let page = self.pages.remove(&page_id)?;
        self.unlink(page_id);
        Some(page)
    }

    /// Makes `page_id` the next eviction candidate.
    pub fn demote(&mut self, page_id: PageId) {
        if self.pages.contains_key(&page_id) {
            self.unlink(page_id);
            self.order.push_front(page_id);
        }
    }

    /// Drops the oldest clean page and returns its id. Dirty pages met on
    /// the way are rotated to the back. Returns `None` when every page is
    /// dirty; nothing is removed in that case.
    pub fn evict(&mut self) -> Option<PageId> {
        for _ in 0..self.order.len() {
            let candidate = self.order.pop_front()?;
            let dirty = self
                .pages
                .get(&candidate)
                .map(|page| page.read().is_dirty())
                .unwrap_or(false);

            if dirty {
                self.order.push_back(candidate);
            } else {
                self.pages.remove(&candidate);
                return Some(candidate);
            }
        }
        None
    }

    /// Page ids from first eviction candidate to most recently used.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.order.iter().copied().collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = (&PageId, &PageRef)> {
        self.pages.iter()
    }

    fn move_to_back(&mut self, page_id: PageId) {
        self.unlink(page_id);
        self.order.push_back(page_id);
    }

    fn unlink(&mut self, page_id: PageId) {
        if let Some(idx) = self.order.iter().position(|&id| id == page_id) {
            self.order.remove(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::{Page, TableId};
    use crate::transaction::TransactionId;

    fn id(n: u32) -> PageId {
        PageId::new(TableId(1), n)
    }

    fn page(n: u32) -> PageRef {
        Page::empty(id(n), 64).into_ref()
    }

    fn dirty_page(n: u32) -> PageRef {
        let page = page(n);
        page.write().mark_dirty(TransactionId::new(1));
        page
    }

    #[test]
    fn test_evicts_oldest_clean_first() {
        let mut cache = PageCache::new(3);
        cache.insert(id(1), page(1));
        cache.insert(id(2), page(2));
        cache.insert(id(3), page(3));
        assert!(cache.is_full());

        assert_eq!(cache.evict(), Some(id(1)));
        assert_eq!(cache.evict(), Some(id(2)));
        assert_eq!(cache.page_ids(), vec![id(3)]);
    }

    #[test]
    fn test_hit_moves_page_to_back() {
        let mut cache = PageCache::new(3);
        cache.insert(id(1), page(1));
        cache.insert(id(2), page(2));
        cache.insert(id(3), page(3));

        assert!(cache.get(id(1)).is_some());
        assert_eq!(cache.page_ids(), vec![id(2), id(3), id(1)]);
        assert_eq!(cache.evict(), Some(id(2)));
    }

    #[test]
    fn test_dirty_pages_skipped_and_rotated() {
        let mut cache = PageCache::new(3);
        cache.insert(id(1), dirty_page(1));
        cache.insert(id(2), dirty_page(2));
        cache.insert(id(3), page(3));

        assert_eq!(cache.evict(), Some(id(3)));
        // Both dirty pages were moved behind the evicted one, order kept
        assert_eq!(cache.page_ids(), vec![id(1), id(2)]);
        assert!(cache.contains(id(1)));
        assert!(cache.contains(id(2)));
    }

    #[test]
    fn test_all_dirty_evicts_nothing() {
        let mut cache = PageCache::new(2);
        cache.insert(id(1), dirty_page(1));
        cache.insert(id(2), dirty_page(2));

        assert_eq!(cache.evict(), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.page_ids(), vec![id(1), id(2)]);
    }

    #[test]
    fn test_replace_and_remove() {
        let mut cache = PageCache::new(2);
        cache.insert(id(1), page(1));
        cache.insert(id(2), page(2));

        let replacement = dirty_page(1);
        cache.insert(id(1), replacement.clone());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.page_ids(), vec![id(2), id(1)]);
        assert!(std::sync::Arc::ptr_eq(cache.peek(id(1)).unwrap(), &replacement));

        assert!(cache.remove(id(2)).is_some());
        assert!(cache.remove(id(2)).is_none());
        assert_eq!(cache.page_ids(), vec![id(1)]);
    }

    #[test]
    fn test_demote_makes_next_candidate() {
        let mut cache = PageCache::new(3);
        cache.insert(id(1), page(1));
        cache.insert(id(2), page(2));
        cache.insert(id(3), page(3));

        cache.demote(id(3));
        assert_eq!(cache.evict(), Some(id(3)));

        // Unknown ids are ignored
        cache.demote(id(9));
        assert_eq!(cache.page_ids(), vec![id(1), id(2)]);
    }
}
