/// 查询子句种类
///
/// 声明顺序就是命令中子句的渲染顺序，服务端按这个顺序解析参数，
/// 调整顺序会改变查询语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseKind {
    Cursor,
    Limit,
    Sparse,
    Match,
    Order,
    Distance,
    Where,
    WhereIn,
    WhereEval,
    WhereEvalSha,
    Clip,
    NoFields,
    Fence,
    Detect,
    Commands,
    Output,
    GetObject,
    Bounds,
    GeoJson,
    Tile,
    QuadKey,
    Hash,
    Point,
    Circle,
    Roam,
}

impl ClauseKind {
    pub const COUNT: usize = 25;

    /// 固定的渲染顺序
    pub const ORDER: [ClauseKind; Self::COUNT] = [
        ClauseKind::Cursor,
        ClauseKind::Limit,
        ClauseKind::Sparse,
        ClauseKind::Match,
        ClauseKind::Order,
        ClauseKind::Distance,
        ClauseKind::Where,
        ClauseKind::WhereIn,
        ClauseKind::WhereEval,
        ClauseKind::WhereEvalSha,
        ClauseKind::Clip,
        ClauseKind::NoFields,
        ClauseKind::Fence,
        ClauseKind::Detect,
        ClauseKind::Commands,
        ClauseKind::Output,
        ClauseKind::GetObject,
        ClauseKind::Bounds,
        ClauseKind::GeoJson,
        ClauseKind::Tile,
        ClauseKind::QuadKey,
        ClauseKind::Hash,
        ClauseKind::Point,
        ClauseKind::Circle,
        ClauseKind::Roam,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// 可以出现多次的子句，多次调用会累积
    pub const fn is_multi_valued(self) -> bool {
        matches!(
            self,
            ClauseKind::Match
                | ClauseKind::Where
                | ClauseKind::WhereIn
                | ClauseKind::WhereEval
                | ClauseKind::WhereEvalSha
        )
    }

    /// 描述查询区域的子句
    pub const fn is_area(self) -> bool {
        matches!(
            self,
            ClauseKind::GetObject
                | ClauseKind::Bounds
                | ClauseKind::GeoJson
                | ClauseKind::Tile
                | ClauseKind::QuadKey
                | ClauseKind::Hash
                | ClauseKind::Point
                | ClauseKind::Circle
                | ClauseKind::Roam
        )
    }
}

/// 按子句种类索引的定长表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClauseSet {
    slots: [Option<Vec<String>>; ClauseKind::COUNT],
}

impl ClauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个子句
    ///
    /// 单值子句直接覆盖。多值子句把新的 token 放在已有 token 之前，
    /// 所以最后一次调用最先渲染。
    pub fn set(&mut self, kind: ClauseKind, tokens: Vec<String>) {
        let slot = &mut self.slots[kind.index()];
        match slot.take() {
            Some(existing) if kind.is_multi_valued() => {
                let mut merged = tokens;
                merged.extend(existing);
                *slot = Some(merged);
            }
            _ => *slot = Some(tokens),
        }
    }

    pub fn get(&self, kind: ClauseKind) -> Option<&[String]> {
        self.slots[kind.index()].as_deref()
    }

    pub fn contains(&self, kind: ClauseKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// 按固定顺序展开所有 token
    pub fn tokens(&self) -> impl Iterator<Item = &String> {
        ClauseKind::ORDER
            .iter()
            .filter_map(|kind| self.slots[kind.index()].as_ref())
            .flatten()
    }
}
