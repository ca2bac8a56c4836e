use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::error::{Result, SplitError};

/// Where a part's output file will land once processed, mapped to the
/// combined output it contributes to.
pub type CombineMap = FxHashMap<PathBuf, PathBuf>;

/// Group identifier to the original members merged into that group.
pub type GroupInfo = FxHashMap<String, Vec<GroupMember>>;

/// Positional arguments for one task invocation.
pub type TaskArgs = Vec<TaskArg>;

/// Batch assignment: a sample may belong to one batch or to several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Batch {
    One(String),
    Many(Vec<String>),
}

impl Batch {
    pub fn names(&self) -> Vec<&str> {
        match self {
            Batch::One(name) => vec![name.as_str()],
            Batch::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// Sample metadata the engine and variant glue look at, plus anything else
/// the sample sheet carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<Batch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phenotype: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Pending combination details for one file key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineInfo {
    /// Combined output this item ultimately contributes to.
    pub out: PathBuf,
    /// Additional files folded into this item that belong to the same output.
    #[serde(default)]
    pub extras: Vec<PathBuf>,
}

impl CombineInfo {
    pub fn new<P: Into<PathBuf>>(out: P) -> Self {
        Self {
            out: out.into(),
            extras: Vec::new(),
        }
    }
}

/// An original item recorded when it was merged into a group, together with
/// the output path it expected before grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub item: Item,
    pub out: Option<PathBuf>,
}

/// One unit of pipeline state.
///
/// The fields the engine reads are typed; everything else a caller wants to
/// carry along (sample name, configuration, region, ...) lives in `fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub combine: BTreeMap<String, CombineInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_orig: Vec<GroupMember>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<K: Into<String>, P: Into<PathBuf>>(mut self, key: K, path: P) -> Self {
        self.files.insert(key.into(), path.into());
        self
    }

    pub fn with_field<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_combine<K: Into<String>>(mut self, key: K, info: CombineInfo) -> Self {
        self.combine.insert(key.into(), info);
        self
    }

    pub fn file(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(PathBuf::as_path)
    }

    pub fn set_file<K: Into<String>, P: Into<PathBuf>>(&mut self, key: K, path: P) {
        self.files.insert(key.into(), path.into());
    }

    pub fn remove_file(&mut self, key: &str) -> Option<PathBuf> {
        self.files.remove(key)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The single key under which this item carries combine information.
    pub fn combine_key(&self) -> Result<&str> {
        let mut keys = self.combine.keys();
        match (keys.next(), keys.next()) {
            (Some(key), None) => Ok(key.as_str()),
            (None, _) => Err(SplitError::contract("item carries no combine information")),
            (Some(_), Some(_)) => Err(SplitError::contract(format!(
                "item carries combine information for {} keys; expected exactly one",
                self.combine.len()
            ))),
        }
    }

    pub fn has_combine(&self) -> bool {
        !self.combine.is_empty()
    }

    /// Value of a named argument for downstream tasks: files first, then
    /// extension fields.
    pub fn arg_value(&self, key: &str) -> Option<Value> {
        if let Some(path) = self.files.get(key) {
            return Some(Value::String(path.to_string_lossy().into_owned()));
        }
        self.fields.get(key).cloned()
    }

    /// Paths stored under `key`, either as a single file or a list field.
    pub fn paths(&self, key: &str) -> Vec<PathBuf> {
        if let Some(path) = self.files.get(key) {
            return vec![path.clone()];
        }
        match self.fields.get(key) {
            Some(Value::String(s)) => vec![PathBuf::from(s)],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(PathBuf::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn batches(&self) -> Vec<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.batch.as_ref())
            .map(Batch::names)
            .unwrap_or_default()
    }

    pub fn phenotype(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.phenotype.as_deref())
    }

    /// Sample name: a plain string or the last entry of a name list.
    pub fn sample_name(&self) -> Option<&str> {
        match self.fields.get("name")? {
            Value::String(name) => Some(name.as_str()),
            Value::Array(names) => names.last().and_then(Value::as_str),
            _ => None,
        }
    }
}

/// A single positional argument handed to a task function.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskArg {
    Item(Item),
    Path(PathBuf),
    Paths(Vec<PathBuf>),
    Value(Value),
}

impl TaskArg {
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            TaskArg::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_item_mut(&mut self) -> Option<&mut Item> {
        match self {
            TaskArg::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            TaskArg::Item(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            TaskArg::Path(path) => Some(path.as_path()),
            TaskArg::Value(Value::String(s)) => Some(Path::new(s)),
            _ => None,
        }
    }

    /// List-of-paths view: `Paths` directly, or a JSON array of strings.
    pub fn to_paths(&self) -> Option<Vec<PathBuf>> {
        match self {
            TaskArg::Paths(paths) => Some(paths.clone()),
            TaskArg::Path(path) => Some(vec![path.clone()]),
            TaskArg::Value(Value::Array(values)) => values
                .iter()
                .map(|v| v.as_str().map(PathBuf::from))
                .collect(),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            TaskArg::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<Item> for TaskArg {
    fn from(item: Item) -> Self {
        TaskArg::Item(item)
    }
}

impl From<PathBuf> for TaskArg {
    fn from(path: PathBuf) -> Self {
        TaskArg::Path(path)
    }
}

impl From<&Path> for TaskArg {
    fn from(path: &Path) -> Self {
        TaskArg::Path(path.to_path_buf())
    }
}

impl From<Vec<PathBuf>> for TaskArg {
    fn from(paths: Vec<PathBuf>) -> Self {
        TaskArg::Paths(paths)
    }
}

impl From<Value> for TaskArg {
    fn from(value: Value) -> Self {
        TaskArg::Value(value)
    }
}

/// Result of calling a split function on one input argument list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitOutcome {
    /// Final (combined) output for the input, if any.
    pub out_final: Option<PathBuf>,
    /// Per-part arguments, appended to the input's own arguments.
    pub parts: Vec<TaskArgs>,
}

impl SplitOutcome {
    pub fn new<P: Into<PathBuf>>(out_final: P, parts: Vec<TaskArgs>) -> Self {
        Self {
            out_final: Some(out_final.into()),
            parts,
        }
    }

    /// Input needs no processing and produces nothing on its own.
    pub fn passthrough() -> Self {
        Self::default()
    }
}

/// Which slot of a part's own arguments holds its output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutfileIndex {
    #[default]
    Last,
    At(usize),
}

impl OutfileIndex {
    pub(crate) fn select<'a>(&self, part: &'a [TaskArg]) -> Option<&'a TaskArg> {
        match *self {
            OutfileIndex::Last => part.last(),
            OutfileIndex::At(i) => part.get(i),
        }
    }
}

/// Extra item fields forwarded to a combine task, and which of them collapse
/// to a single value instead of a per-member list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineArgKeys {
    keys: Vec<String>,
    single: FxHashSet<String>,
}

impl CombineArgKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            single: FxHashSet::default(),
        }
    }

    /// Mark keys whose value is constant across a combine group; only the
    /// last seen value is forwarded.
    pub fn single<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.single.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Reference genome and configuration collapse; everything else is per member.
    pub fn reference_and_config<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(keys).single(["sam_ref", "config"])
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn is_single(&self, key: &str) -> bool {
        self.single.contains(key)
    }
}
