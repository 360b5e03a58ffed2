//! Tree locator: finds the anchor node and the control placement inside a
//! tree the overlay does not own.
//!
//! Nothing is cached here. Every call searches the live tree again, because
//! the host may have rebuilt it since the last pass.

use serde::{Deserialize, Serialize};

use skinbridge_protocol::{LOCATOR_RETRY_DELAY_MS, LOCATOR_RETRY_LIMIT};

use crate::host::{HostTree, NodeId, Rect};
use crate::phase::PhaseGate;

/// One way of finding the target in the host tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorStrategy {
    /// The visually centered item of the carousel.
    Centered,
    /// The item flagged as selected.
    Selected,
    /// First anchor-classed node anywhere in the tree.
    Direct,
    /// Walk every carousel item and inspect its sub-elements.
    CarouselScan,
}

impl std::fmt::Display for AnchorStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Centered => "centered",
            Self::Selected => "selected",
            Self::Direct => "direct",
            Self::CarouselScan => "carousel-scan",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Class of every candidate item in the carousel.
    pub item_class: String,
    /// Extra class carried by the centered item.
    pub centered_class: String,
    /// Extra class carried by the selected item.
    pub selected_class: String,
    /// Class of the carousel container.
    pub carousel_class: String,
    /// Classes that together identify the anchor inside an item.
    pub anchor_classes: Vec<String>,
    /// Anchor search order; first match wins.
    pub anchor_order: Vec<AnchorStrategy>,
    /// Item search order for the control placement.
    pub placement_order: Vec<AnchorStrategy>,
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            item_class: "skin-selection-item".to_string(),
            centered_class: "skin-carousel-offset-2".to_string(),
            selected_class: "skin-selection-item-selected".to_string(),
            carousel_class: "skin-selection-carousel".to_string(),
            anchor_classes: vec![
                "skin-selection-item-information".to_string(),
                "loyalty-reward-icon--rewards".to_string(),
            ],
            anchor_order: vec![
                AnchorStrategy::Centered,
                AnchorStrategy::Selected,
                AnchorStrategy::Direct,
                AnchorStrategy::CarouselScan,
            ],
            placement_order: vec![AnchorStrategy::Centered, AnchorStrategy::Selected],
            retry_limit: LOCATOR_RETRY_LIMIT,
            retry_delay_ms: LOCATOR_RETRY_DELAY_MS,
        }
    }
}

/// Size and offset of the injected control relative to the placement item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlGeometry {
    pub width: f64,
    pub height: f64,
    /// Distance from the item's top edge to the control's top edge.
    pub vertical_offset: f64,
    pub z_index: i32,
}

impl Default for ControlGeometry {
    fn default() -> Self {
        Self {
            width: 38.0,
            height: 23.0,
            vertical_offset: 78.0,
            z_index: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub node: NodeId,
    pub strategy: AnchorStrategy,
}

#[derive(Debug, Clone)]
pub struct TreeLocator {
    config: LocatorConfig,
    geometry: ControlGeometry,
}

impl TreeLocator {
    pub fn new(config: LocatorConfig, geometry: ControlGeometry) -> Self {
        Self { config, geometry }
    }

    pub fn geometry(&self) -> &ControlGeometry {
        &self.geometry
    }

    /// Find the anchor node. Does not search at all outside the phase.
    pub fn locate_anchor(&self, gate: &PhaseGate, tree: &dyn HostTree) -> Option<Located> {
        if !gate.in_phase() || self.config.anchor_classes.is_empty() {
            return None;
        }

        self.config.anchor_order.iter().find_map(|strategy| {
            self.anchor_by(*strategy, tree).map(|node| {
                tracing::trace!(node = %node, strategy = %strategy, "Anchor located");
                Located {
                    node,
                    strategy: *strategy,
                }
            })
        })
    }

    /// Where the control should sit: centered horizontally on the placement
    /// item, `vertical_offset` below its top edge.
    pub fn locate_placement(&self, gate: &PhaseGate, tree: &dyn HostTree) -> Option<Rect> {
        if !gate.in_phase() {
            return None;
        }

        let rect = self
            .config
            .placement_order
            .iter()
            .filter_map(|strategy| self.item_by(*strategy, tree))
            .find_map(|item| tree.bounding_rect(item))?;

        let g = &self.geometry;
        Some(Rect {
            x: rect.x + rect.width / 2.0 - g.width / 2.0,
            y: rect.y + g.vertical_offset,
            width: g.width,
            height: g.height,
        })
    }

    fn anchor_by(&self, strategy: AnchorStrategy, tree: &dyn HostTree) -> Option<NodeId> {
        let cfg = &self.config;
        let anchor = as_strs(&cfg.anchor_classes);
        match strategy {
            AnchorStrategy::Centered => tree
                .select_all(&[cfg.item_class.as_str(), cfg.centered_class.as_str()])
                .into_iter()
                .find_map(|item| tree.select_within(item, &anchor)),
            AnchorStrategy::Selected => {
                let item =
                    tree.select_first(&[cfg.item_class.as_str(), cfg.selected_class.as_str()])?;
                tree.select_within(item, &anchor)
            }
            AnchorStrategy::Direct => tree.select_first(&anchor),
            AnchorStrategy::CarouselScan => {
                let carousel = tree.select_first(&[cfg.carousel_class.as_str()])?;
                let (first, rest) = anchor.split_first()?;
                tree.select_all_within(carousel, &[cfg.item_class.as_str()])
                    .into_iter()
                    .filter_map(|item| tree.select_within(item, &[*first]))
                    .find(|info| rest.iter().all(|class| tree.has_class(*info, class)))
            }
        }
    }

    fn item_by(&self, strategy: AnchorStrategy, tree: &dyn HostTree) -> Option<NodeId> {
        let cfg = &self.config;
        let item = cfg.item_class.as_str();
        match strategy {
            AnchorStrategy::Centered => tree.select_first(&[item, cfg.centered_class.as_str()]),
            AnchorStrategy::Selected => tree.select_first(&[item, cfg.selected_class.as_str()]),
            AnchorStrategy::Direct => tree.select_first(&[item]),
            AnchorStrategy::CarouselScan => {
                let carousel = tree.select_first(&[cfg.carousel_class.as_str()])?;
                tree.select_within(carousel, &[item])
            }
        }
    }
}

fn as_strs(classes: &[String]) -> Vec<&str> {
    classes.iter().map(String::as_str).collect()
}
