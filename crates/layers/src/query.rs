use crate::layer::Layer;

fn zoom_allows(layer: &Layer, zoom: f64) -> bool {
    // Missing bounds are unbounded.
    let above_min = layer.zoom_min.is_none_or(|min| min < zoom);
    let below_max = layer.zoom_max.is_none_or(|max| zoom < max);
    above_min && below_max
}

pub fn is_queryable(layer: &Layer, zoom: f64) -> bool {
    layer.visible && layer.queryable && layer.use_in_feature_info && zoom_allows(layer, zoom)
}

/// Layers eligible for an information query at `zoom`, in stack order.
pub fn select_queryable(layers: &[Layer], zoom: f64) -> Vec<&Layer> {
    layers.iter().filter(|l| is_queryable(l, zoom)).collect()
}

#[cfg(test)]
mod tests {
    use super::select_queryable;
    use crate::layer::{Layer, LayerKind};

    fn ids<'a>(layers: &[&'a Layer]) -> Vec<&'a str> {
        layers.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn filters_flags_and_zoom_bounds() {
        let mut hidden = Layer::new("hidden", LayerKind::Wmts);
        hidden.visible = false;
        let mut not_queryable = Layer::new("nq", LayerKind::Wmts);
        not_queryable.queryable = false;
        let mut opted_out = Layer::new("opt", LayerKind::Vector);
        opted_out.use_in_feature_info = false;
        let mut zoomed = Layer::new("zoomed", LayerKind::WmtsNonTiled);
        zoomed.zoom_min = Some(12.0);
        zoomed.zoom_max = Some(18.0);
        let open = Layer::new("open", LayerKind::Vector);

        let layers = vec![hidden, not_queryable, opted_out, zoomed, open];
        assert_eq!(ids(&select_queryable(&layers, 14.0)), vec!["zoomed", "open"]);
        assert_eq!(ids(&select_queryable(&layers, 10.0)), vec!["open"]);
    }

    #[test]
    fn zoom_bounds_are_exclusive() {
        let mut layer = Layer::new("l", LayerKind::Wmts);
        layer.zoom_min = Some(12.0);
        layer.zoom_max = Some(18.0);
        let layers = vec![layer];
        assert!(select_queryable(&layers, 12.0).is_empty());
        assert!(select_queryable(&layers, 18.0).is_empty());
        assert_eq!(select_queryable(&layers, 12.5).len(), 1);
    }
}
