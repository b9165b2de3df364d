pub mod memory;
pub mod store;

pub mod geometry {
    use glam::{DAffine2, DVec2};
    use serde::{Deserialize, Serialize};

    /// 图纸空间中的二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn zero() -> Self {
            Self(DVec2::ZERO)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于裁剪框与视口外框。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 以中心点与半尺寸构造包围盒。
        #[inline]
        pub fn from_center(center: Point2, half_extent: Vector2) -> Self {
            Self {
                min: Point2::from_vec(center.as_vec2() - half_extent.as_vec2()),
                max: Point2::from_vec(center.as_vec2() + half_extent.as_vec2()),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        /// 半宽与半高；空包围盒返回零向量。
        #[inline]
        pub fn half_extent(&self) -> Vector2 {
            if self.is_empty() {
                return Vector2::zero();
            }
            Vector2((self.max.as_vec2() - self.min.as_vec2()) * 0.5)
        }
    }

    /// 图纸视图之间的二维仿射变换。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Transform2D(pub DAffine2);

    impl Transform2D {
        #[inline]
        pub fn identity() -> Self {
            Self(DAffine2::IDENTITY)
        }

        #[inline]
        pub fn from_translation(offset: Vector2) -> Self {
            Self(DAffine2::from_translation(offset.as_vec2()))
        }

        #[inline]
        pub fn apply(&self, point: Point2) -> Point2 {
            Point2::from_vec(self.0.transform_point2(point.as_vec2()))
        }

        #[inline]
        pub fn is_identity(&self) -> bool {
            self.0 == DAffine2::IDENTITY
        }
    }

    impl Default for Transform2D {
        fn default() -> Self {
            Self::identity()
        }
    }

}

pub mod document {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Transform2D, Vector2};

    /// 文档内所有对象（标高、视图、图纸、图元）共享同一个 ID 空间。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ElementId(u64);

    impl ElementId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    impl fmt::Display for ElementId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "#{}", self.0)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Level {
        pub id: ElementId,
        pub name: String,
        pub elevation: f64,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ViewKind {
        FloorPlan,
        CeilingPlan,
        Section,
        Elevation,
        Drafting,
        Legend,
        Schedule,
    }

    impl ViewKind {
        /// 图例与明细表可在多张图纸上重复放置。
        #[inline]
        pub fn is_shareable(self) -> bool {
            matches!(self, ViewKind::Legend | ViewKind::Schedule)
        }
    }

    /// 视图裁剪区域：裁剪框、是否启用、是否可见。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct CropRegion {
        pub bounds: Bounds2D,
        pub active: bool,
        pub visible: bool,
    }

    impl Default for CropRegion {
        fn default() -> Self {
            Self {
                bounds: Bounds2D::from_center(Point2::new(0.0, 0.0), Vector2::new(50.0, 50.0)),
                active: false,
                visible: false,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct View {
        pub id: ElementId,
        pub name: String,
        pub kind: ViewKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub level: Option<ElementId>,
        #[serde(default)]
        pub crop: CropRegion,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub template: Option<ElementId>,
        #[serde(default)]
        pub is_template: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Sheet {
        pub id: ElementId,
        pub number: String,
        pub title: String,
        #[serde(default)]
        pub category: String,
        /// 图纸原点，图纸间的坐标变换以此为基准。
        #[serde(default = "Sheet::default_origin")]
        pub origin: Point2,
    }

    impl Sheet {
        fn default_origin() -> Point2 {
            Point2::new(0.0, 0.0)
        }
    }

    /// 视口在图纸上的放置信息。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct ViewportPlacement {
        pub view: ElementId,
        pub center: Point2,
        pub half_extent: Vector2,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", rename_all = "snake_case")]
    pub enum ElementKind {
        Viewport(ViewportPlacement),
        TextNote { text: String, position: Point2 },
        DetailCurve { start: Point2, end: Point2 },
        Tag { label: String, position: Point2 },
        TitleBlock { family: String, origin: Point2 },
        /// 链接导入的外部图形，存储层无法在视图间复制。
        ImportInstance { source: String, origin: Point2 },
    }

    impl ElementKind {
        #[inline]
        pub fn is_viewport(&self) -> bool {
            matches!(self, ElementKind::Viewport(_))
        }

        /// 纯线条修饰图元。
        #[inline]
        pub fn is_curve(&self) -> bool {
            matches!(self, ElementKind::DetailCurve { .. })
        }

        #[inline]
        pub fn kind_name(&self) -> &'static str {
            match self {
                ElementKind::Viewport(_) => "viewport",
                ElementKind::TextNote { .. } => "text_note",
                ElementKind::DetailCurve { .. } => "detail_curve",
                ElementKind::Tag { .. } => "tag",
                ElementKind::TitleBlock { .. } => "title_block",
                ElementKind::ImportInstance { .. } => "import_instance",
            }
        }

        /// 对图元的定位点应用变换。
        pub fn transformed(&self, transform: &Transform2D) -> Self {
            match self {
                ElementKind::Viewport(placement) => ElementKind::Viewport(ViewportPlacement {
                    center: transform.apply(placement.center),
                    ..*placement
                }),
                ElementKind::TextNote { text, position } => ElementKind::TextNote {
                    text: text.clone(),
                    position: transform.apply(*position),
                },
                ElementKind::DetailCurve { start, end } => ElementKind::DetailCurve {
                    start: transform.apply(*start),
                    end: transform.apply(*end),
                },
                ElementKind::Tag { label, position } => ElementKind::Tag {
                    label: label.clone(),
                    position: transform.apply(*position),
                },
                ElementKind::TitleBlock { family, origin } => ElementKind::TitleBlock {
                    family: family.clone(),
                    origin: transform.apply(*origin),
                },
                ElementKind::ImportInstance { source, origin } => ElementKind::ImportInstance {
                    source: source.clone(),
                    origin: transform.apply(*origin),
                },
            }
        }
    }

    /// 归属于某个视图（或图纸）的图元。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Element {
        pub id: ElementId,
        pub owner: ElementId,
        pub kind: ElementKind,
        #[serde(default = "Element::default_true")]
        pub view_specific: bool,
        #[serde(default = "Element::default_true")]
        pub valid: bool,
    }

    impl Element {
        fn default_true() -> bool {
            true
        }
    }

    /// 从图元派生出的视口视图，供上层只读使用。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Viewport {
        pub id: ElementId,
        pub sheet: ElementId,
        pub view: ElementId,
        pub center: Point2,
    }

    impl Viewport {
        pub fn from_element(element: &Element) -> Option<Self> {
            match &element.kind {
                ElementKind::Viewport(placement) => Some(Self {
                    id: element.id,
                    sheet: element.owner,
                    view: placement.view,
                    center: placement.center,
                }),
                _ => None,
            }
        }
    }

}
