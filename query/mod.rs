//! 空间查询命令编译器
//!
//! `Query` 以消费式 builder 的方式收集子句，`render` 按固定的子句顺序
//! 生成命令。子句参数在写入时校验，几何子句是否齐全默认不校验，
//! 由服务端决定，需要时调用 `validate` 做严格检查。
//!
//! ```
//! use spatio_client::Query;
//!
//! let cmd = Query::nearby("fleet").point(33.46, -112.27).cursor(1).render();
//! assert_eq!(cmd.to_string(), "NEARBY fleet CURSOR 1 POINT 33.46 -112.27");
//! ```

pub mod clause;
pub mod options;

use std::fmt::{self, Display};
use std::str::FromStr;

use geojson::GeoJson;

use crate::error::{Result, SpatioError};
use crate::protocol::Command;

pub use clause::{ClauseKind, ClauseSet};
pub use options::{DetectKind, FenceCommand, OutputFormat, SortOrder};

/// 查询动词
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Nearby,
    Within,
    Intersects,
    Scan,
    Search,
}

impl QueryType {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryType::Nearby => "NEARBY",
            QueryType::Within => "WITHIN",
            QueryType::Intersects => "INTERSECTS",
            QueryType::Scan => "SCAN",
            QueryType::Search => "SEARCH",
        }
    }

    /// 是否需要一个区域子句才有意义
    fn accepts_area(self, kind: ClauseKind) -> bool {
        match self {
            QueryType::Nearby => matches!(kind, ClauseKind::Point | ClauseKind::Roam),
            QueryType::Within | QueryType::Intersects => {
                kind.is_area() && !matches!(kind, ClauseKind::Point | ClauseKind::Roam)
            }
            QueryType::Scan | QueryType::Search => false,
        }
    }

    fn requires_area(self) -> bool {
        matches!(
            self,
            QueryType::Nearby | QueryType::Within | QueryType::Intersects
        )
    }
}

impl Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = SpatioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NEARBY" => Ok(QueryType::Nearby),
            "WITHIN" => Ok(QueryType::Within),
            "INTERSECTS" => Ok(QueryType::Intersects),
            "SCAN" => Ok(QueryType::Scan),
            "SEARCH" => Ok(QueryType::Search),
            _ => Err(SpatioError::invalid(format!("unknown query type '{}'", s))),
        }
    }
}

/// 空间查询
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    query_type: QueryType,
    key: String,
    clauses: ClauseSet,
}

impl Query {
    pub fn new(query_type: QueryType, key: impl Into<String>) -> Self {
        Self {
            query_type,
            key: key.into(),
            clauses: ClauseSet::new(),
        }
    }

    pub fn nearby(key: impl Into<String>) -> Self {
        Self::new(QueryType::Nearby, key)
    }

    pub fn within(key: impl Into<String>) -> Self {
        Self::new(QueryType::Within, key)
    }

    pub fn intersects(key: impl Into<String>) -> Self {
        Self::new(QueryType::Intersects, key)
    }

    pub fn scan(key: impl Into<String>) -> Self {
        Self::new(QueryType::Scan, key)
    }

    pub fn search(key: impl Into<String>) -> Self {
        Self::new(QueryType::Search, key)
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn clauses(&self) -> &ClauseSet {
        &self.clauses
    }

    pub fn is_fence(&self) -> bool {
        self.clauses.contains(ClauseKind::Fence)
    }

    fn with(mut self, kind: ClauseKind, tokens: Vec<String>) -> Self {
        self.clauses.set(kind, tokens);
        self
    }

    // ------------------------------------------------------------------
    // 分页与过滤
    // ------------------------------------------------------------------

    pub fn cursor(self, start: u64) -> Self {
        self.with(ClauseKind::Cursor, vec!["CURSOR".into(), start.to_string()])
    }

    pub fn limit(self, count: u64) -> Self {
        self.with(ClauseKind::Limit, vec!["LIMIT".into(), count.to_string()])
    }

    /// 稀疏采样，只接受 1..=8
    pub fn sparse(self, spread: u8) -> Result<Self> {
        if !(1..=8).contains(&spread) {
            return Err(SpatioError::invalid(format!(
                "SPARSE must be between 1 and 8, got {}",
                spread
            )));
        }
        Ok(self.with(ClauseKind::Sparse, vec!["SPARSE".into(), spread.to_string()]))
    }

    pub fn match_pattern(self, pattern: impl Into<String>) -> Self {
        self.with(ClauseKind::Match, vec!["MATCH".into(), pattern.into()])
    }

    pub fn order(self, order: SortOrder) -> Self {
        self.with(ClauseKind::Order, vec![order.keyword().into()])
    }

    pub fn asc(self) -> Self {
        self.order(SortOrder::Asc)
    }

    pub fn desc(self) -> Self {
        self.order(SortOrder::Desc)
    }

    /// 在结果中返回距离（NEARBY）
    pub fn distance(self) -> Self {
        self.with(ClauseKind::Distance, vec!["DISTANCE".into()])
    }

    /// 字段范围过滤，min/max 可以是 `-inf` / `+inf`
    pub fn where_range(self, field: impl Into<String>, min: impl Display, max: impl Display) -> Self {
        self.with(
            ClauseKind::Where,
            vec!["WHERE".into(), field.into(), min.to_string(), max.to_string()],
        )
    }

    pub fn where_in<I>(self, field: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        if values.is_empty() {
            return Err(SpatioError::invalid("WHEREIN requires at least one value"));
        }

        let mut tokens = vec!["WHEREIN".into(), field.into(), values.len().to_string()];
        tokens.extend(values);
        Ok(self.with(ClauseKind::WhereIn, tokens))
    }

    pub fn where_eval<I>(self, script: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let tokens = eval_tokens("WHEREEVAL", script.into(), args);
        self.with(ClauseKind::WhereEval, tokens)
    }

    pub fn where_eval_sha<I>(self, sha: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let tokens = eval_tokens("WHEREEVALSHA", sha.into(), args);
        self.with(ClauseKind::WhereEvalSha, tokens)
    }

    pub fn clip(self) -> Self {
        self.with(ClauseKind::Clip, vec!["CLIP".into()])
    }

    pub fn no_fields(self) -> Self {
        self.with(ClauseKind::NoFields, vec!["NOFIELDS".into()])
    }

    // ------------------------------------------------------------------
    // 地理围栏
    // ------------------------------------------------------------------

    /// 标记为实时围栏查询
    pub fn fence(self) -> Self {
        self.with(ClauseKind::Fence, vec!["FENCE".into()])
    }

    pub fn detect(self, kinds: &[DetectKind]) -> Result<Self> {
        if kinds.is_empty() {
            return Err(SpatioError::invalid("DETECT requires at least one kind"));
        }
        Ok(self.with(
            ClauseKind::Detect,
            vec!["DETECT".into(), options::comma_list(kinds)],
        ))
    }

    pub fn commands(self, commands: &[FenceCommand]) -> Result<Self> {
        if commands.is_empty() {
            return Err(SpatioError::invalid("COMMANDS requires at least one command"));
        }
        Ok(self.with(
            ClauseKind::Commands,
            vec!["COMMANDS".into(), options::comma_list(commands)],
        ))
    }

    pub fn output(self, format: OutputFormat) -> Result<Self> {
        let format = format.validate()?;
        Ok(self.with(ClauseKind::Output, format.tokens()))
    }

    // ------------------------------------------------------------------
    // 查询区域
    // ------------------------------------------------------------------

    /// 以已存储对象作为查询区域
    pub fn get_object(self, key: impl Into<String>, id: impl Into<String>) -> Self {
        self.with(
            ClauseKind::GetObject,
            vec!["GET".into(), key.into(), id.into()],
        )
    }

    pub fn bounds(self, min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        self.with(
            ClauseKind::Bounds,
            vec![
                "BOUNDS".into(),
                min_lat.to_string(),
                min_lon.to_string(),
                max_lat.to_string(),
                max_lon.to_string(),
            ],
        )
    }

    /// GeoJSON 区域，序列化为紧凑 JSON 后作为单个参数
    pub fn object(self, geojson: impl Into<GeoJson>) -> Self {
        let json = geojson.into().to_string();
        self.with(ClauseKind::GeoJson, vec!["OBJECT".into(), json])
    }

    pub fn tile(self, x: u64, y: u64, z: u8) -> Self {
        self.with(
            ClauseKind::Tile,
            vec!["TILE".into(), x.to_string(), y.to_string(), z.to_string()],
        )
    }

    pub fn quad_key(self, key: impl Into<String>) -> Self {
        self.with(ClauseKind::QuadKey, vec!["QUADKEY".into(), key.into()])
    }

    pub fn hash(self, geohash: impl Into<String>) -> Self {
        self.with(ClauseKind::Hash, vec!["HASH".into(), geohash.into()])
    }

    pub fn point(self, lat: f64, lon: f64) -> Self {
        self.with(
            ClauseKind::Point,
            vec!["POINT".into(), lat.to_string(), lon.to_string()],
        )
    }

    pub fn point_radius(self, lat: f64, lon: f64, meters: f64) -> Self {
        self.with(
            ClauseKind::Point,
            vec![
                "POINT".into(),
                lat.to_string(),
                lon.to_string(),
                meters.to_string(),
            ],
        )
    }

    pub fn circle(self, lat: f64, lon: f64, meters: f64) -> Self {
        self.with(
            ClauseKind::Circle,
            vec![
                "CIRCLE".into(),
                lat.to_string(),
                lon.to_string(),
                meters.to_string(),
            ],
        )
    }

    /// 对另一集合中的移动对象做邻近检测
    pub fn roam(self, key: impl Into<String>, pattern: impl Into<String>, meters: f64) -> Self {
        self.with(
            ClauseKind::Roam,
            vec!["ROAM".into(), key.into(), pattern.into(), meters.to_string()],
        )
    }

    // ------------------------------------------------------------------
    // 渲染
    // ------------------------------------------------------------------

    pub fn render(&self) -> Command {
        Command::new(self.query_type.as_str())
            .arg(self.key.as_str())
            .args(self.clauses.tokens().cloned())
    }

    /// 严格模式校验，默认的 `render` 不会调用它
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(SpatioError::invalid("collection key must not be empty"));
        }

        if self.query_type.requires_area() {
            let has_area = ClauseKind::ORDER
                .iter()
                .any(|&kind| self.query_type.accepts_area(kind) && self.clauses.contains(kind));
            if !has_area {
                return Err(SpatioError::invalid(format!(
                    "{} query on '{}' has no area clause",
                    self.query_type, self.key
                )));
            }
        }

        Ok(())
    }
}

fn eval_tokens<I>(keyword: &str, script: String, args: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Display,
{
    let args: Vec<String> = args.into_iter().map(|a| a.to_string()).collect();
    let mut tokens = vec![keyword.to_string(), script, args.len().to_string()];
    tokens.extend(args);
    tokens
}
