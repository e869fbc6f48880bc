use crate::{
    BlockFilter, BlockRow, BoundEdit, Column, CoreContext, FieldValue, JitBlockTableModel,
    SortOrder, SortSpec,
};

/// Filtering and sorting view over a [`JitBlockTableModel`].
///
/// Visible row `i` maps to source row `mapping[i]`. The mapping is recomputed in one pass after
/// every refresh, filter edit, sort change or row removal.
#[derive(Debug, Default)]
pub struct JitBlockProxyModel {
    source: JitBlockTableModel,
    filter: BlockFilter,
    sort: Option<SortSpec>,
    mapping: Vec<usize>,
}

impl JitBlockProxyModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(sort: SortSpec) -> Self {
        Self {
            sort: Some(sort),
            ..Self::default()
        }
    }

    pub fn source(&self) -> &JitBlockTableModel {
        &self.source
    }

    pub fn filter(&self) -> &BlockFilter {
        &self.filter
    }

    pub fn sort_spec(&self) -> Option<SortSpec> {
        self.sort
    }

    /// Refresh the underlying table, then re-filter and re-sort.
    pub fn refresh(&mut self, ctx: &CoreContext<'_>) {
        self.source.refresh(ctx);
        self.invalidate();
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) {
        self.sort = sort;
        self.invalidate();
    }

    pub fn set_filter(&mut self, filter: BlockFilter) {
        self.filter = filter;
        self.invalidate();
    }

    pub fn set_symbol_name(&mut self, name: &str) {
        self.filter.set_symbol_name(name);
        self.invalidate();
    }

    pub fn set_min_effective_address_text(&mut self, text: &str) -> BoundEdit {
        let edit = self.filter.set_min_effective_address_text(text);
        self.invalidate();
        edit
    }

    pub fn set_max_effective_address_text(&mut self, text: &str) -> BoundEdit {
        let edit = self.filter.set_max_effective_address_text(text);
        self.invalidate();
        edit
    }

    pub fn set_physical_address_text(&mut self, text: &str) -> BoundEdit {
        let edit = self.filter.set_physical_address_text(text);
        self.invalidate();
        edit
    }

    pub fn row_count(&self) -> usize {
        self.mapping.len()
    }

    pub fn map_to_source(&self, row: usize) -> Option<usize> {
        self.mapping.get(row).copied()
    }

    pub fn row(&self, row: usize) -> Option<&BlockRow> {
        self.map_to_source(row).and_then(|i| self.source.row(i))
    }

    pub fn visible_rows(&self) -> impl Iterator<Item = &BlockRow> + '_ {
        self.mapping.iter().filter_map(|&i| self.source.row(i))
    }

    /// Visible row index of the block at `effective_address`, if it passes the filter.
    pub fn find_row(&self, effective_address: u32) -> Option<usize> {
        self.visible_rows()
            .position(|r| r.effective_address() == effective_address)
    }

    pub fn field(&self, row: usize, column: Column) -> FieldValue {
        self.row(row).map_or(FieldValue::Empty, |r| r.field(column))
    }

    pub fn display(&self, row: usize, column: Column) -> String {
        self.row(row).map(|r| r.display(column)).unwrap_or_default()
    }

    /// Erase the block shown at visible `row`. Same rules as [`JitBlockTableModel::remove_row`].
    pub fn remove_row(&mut self, row: usize, ctx: &mut CoreContext<'_>) -> bool {
        let Some(source_row) = self.map_to_source(row) else {
            return false;
        };
        let removed = self.source.remove_row(source_row, ctx);
        if removed {
            self.invalidate();
        }
        removed
    }

    fn invalidate(&mut self) {
        let rows = self.source.rows();
        let predicates = self.filter.predicates();
        let visible = (0..rows.len()).filter(|&i| predicates.iter().all(|p| p.matches(&rows[i])));

        self.mapping = match self.sort {
            None => visible.collect(),
            Some(spec) => {
                let mut keyed: Vec<(FieldValue, usize)> =
                    visible.map(|i| (rows[i].field(spec.column), i)).collect();
                keyed.sort_by(|(a, ia), (b, ib)| {
                    let by_key = match spec.order {
                        SortOrder::Ascending => a.compare(b),
                        SortOrder::Descending => b.compare(a),
                    };
                    by_key.then(ia.cmp(ib))
                });
                keyed.into_iter().map(|(_, i)| i).collect()
            }
        };
        tracing::trace!(
            visible = self.mapping.len(),
            total = rows.len(),
            "recomputed block proxy mapping"
        );
    }

    #[cfg(test)]
    pub(crate) fn from_table(source: JitBlockTableModel) -> Self {
        let mut proxy = Self {
            source,
            ..Self::default()
        };
        proxy.invalidate();
        proxy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jitscope_core::{JitBlock, ProfileData, Symbol, SymbolMap};

    fn proxy() -> JitBlockProxyModel {
        let symbols: SymbolMap = [
            Symbol::new("main", 0x8000_1000, 0x10),
            Symbol::new("Render", 0x8000_2000, 0x10),
            Symbol::new("MAIN_loop", 0x8000_4000, 0x10),
        ]
        .into_iter()
        .collect();
        let profile = |cycles| ProfileData {
            run_count: 1,
            cycles_spent: cycles,
            time_spent_ns: 0,
        };
        let blocks = vec![
            JitBlock::new(0x8000_1000, &[0]).with_profile(profile(50)),
            JitBlock::new(0x8000_2000, &[0]).with_profile(profile(10)),
            JitBlock::new(0x8000_3000, &[0]),
            JitBlock::new(0x8000_4000, &[0]).with_profile(profile(50)),
        ];
        let rows = BlockRow::build_all(blocks, &symbols);
        JitBlockProxyModel::from_table(JitBlockTableModel::from_rows(rows))
    }

    fn addresses(proxy: &JitBlockProxyModel) -> Vec<u32> {
        proxy.visible_rows().map(BlockRow::effective_address).collect()
    }

    #[test]
    fn unsorted_keeps_source_order() {
        let proxy = proxy();
        assert_eq!(
            addresses(&proxy),
            vec![0x8000_1000, 0x8000_2000, 0x8000_3000, 0x8000_4000]
        );
    }

    #[test]
    fn sort_breaks_ties_by_source_row_in_both_directions() {
        let mut proxy = proxy();
        proxy.set_sort(Some(SortSpec::new(Column::CyclesSpent, SortOrder::Ascending)));
        assert_eq!(
            addresses(&proxy),
            vec![0x8000_3000, 0x8000_2000, 0x8000_1000, 0x8000_4000]
        );

        proxy.set_sort(Some(SortSpec::new(Column::CyclesSpent, SortOrder::Descending)));
        assert_eq!(
            addresses(&proxy),
            vec![0x8000_1000, 0x8000_4000, 0x8000_2000, 0x8000_3000]
        );
    }

    #[test]
    fn symbol_sort_ignores_case_and_puts_missing_first() {
        let mut proxy = proxy();
        proxy.set_sort(Some(SortSpec::new(Column::Symbol, SortOrder::Ascending)));
        assert_eq!(
            addresses(&proxy),
            vec![0x8000_3000, 0x8000_1000, 0x8000_4000, 0x8000_2000]
        );
    }

    #[test]
    fn filter_and_sort_compose() {
        let mut proxy = proxy();
        proxy.set_sort(Some(SortSpec::new(Column::EffectiveAddress, SortOrder::Descending)));
        proxy.set_symbol_name("MAIN");
        assert_eq!(addresses(&proxy), vec![0x8000_4000, 0x8000_1000]);
        assert_eq!(proxy.map_to_source(0), Some(3));
        assert_eq!(proxy.find_row(0x8000_1000), Some(1));
        assert_eq!(proxy.find_row(0x8000_2000), None);
        assert_eq!(proxy.display(0, Column::Symbol), "MAIN_loop");
        assert_eq!(proxy.field(9, Column::Symbol), FieldValue::Empty);
    }

    #[test]
    fn inverted_bounds_hide_everything() {
        let mut proxy = proxy();
        assert_eq!(
            proxy.set_min_effective_address_text("80003000"),
            BoundEdit::Set(0x8000_3000)
        );
        proxy.set_max_effective_address_text("80001000");
        assert_eq!(proxy.row_count(), 0);
        assert!(proxy.row(0).is_none());
    }
}
