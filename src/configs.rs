use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context, Error, Result};
use ron::{Number, Value};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Options {
    INT(isize),
    FLOAT(f64),
    STR(String),
    BOOL(bool),
    PATH(PathBuf),
    CONFIG(Config),
}

/// Wrap basetype to Options type
macro_rules! from_overloads {
    ($otype:tt, $cast_to:tt, $opt:ident) => {
        impl From<$otype> for Options {
            fn from(i: $otype) -> Self {
                Options::$opt(i as $cast_to)
            }
        }
    };
}

from_overloads!(i32, isize, INT);
from_overloads!(i64, isize, INT);
from_overloads!(u32, isize, INT);
from_overloads!(isize, isize, INT);
from_overloads!(usize, isize, INT);
from_overloads!(f32, f64, FLOAT);
from_overloads!(f64, f64, FLOAT);
from_overloads!(bool, bool, BOOL);

impl From<String> for Options {
    fn from(i: String) -> Self {
        Options::STR(i)
    }
}

impl<'a> From<&'a str> for Options {
    fn from(i: &'a str) -> Self {
        Options::STR(i.into())
    }
}

impl From<PathBuf> for Options {
    fn from(i: PathBuf) -> Self {
        Options::PATH(i)
    }
}

impl From<Config> for Options {
    fn from(i: Config) -> Self {
        Options::CONFIG(i)
    }
}

/// Unwrap Options type to base type, cloning each time
macro_rules! try_into_overloads {
    ($to_type:ty, $opt:ident) => {
        impl TryFrom<&Options> for $to_type {
            type Error = Error;
            fn try_from(i: &Options) -> Result<Self> {
                if let Options::$opt(i) = i {
                    Ok(i.clone() as $to_type)
                } else {
                    Err(Error::msg(format!("expected {} option, found {}", stringify!($opt), i.kind())))
                }
            }
        }
    };
}

try_into_overloads!(isize, INT);
try_into_overloads!(i64, INT);
try_into_overloads!(f64, FLOAT);
try_into_overloads!(f32, FLOAT);
try_into_overloads!(bool, BOOL);
try_into_overloads!(String, STR);
try_into_overloads!(PathBuf, PATH);

impl TryFrom<&Options> for usize {
    type Error = Error;
    fn try_from(i: &Options) -> Result<Self> {
        let i = isize::try_from(i)?;
        usize::try_from(i).map_err(|_| Error::msg(format!("expected a non-negative integer, found {i}")))
    }
}

/// Builds a single option, `[..]` nests a config and `Path(..)` makes a path
#[macro_export]
macro_rules! opt {
    ([$($inner:tt)*]) => {
        $crate::configs::Options::CONFIG($crate::config!($($inner)*))
    };
    (Path($p:expr)) => {
        $crate::configs::Options::PATH(std::path::PathBuf::from($p))
    };
    ($v:expr) => {
        $crate::configs::Options::from($v)
    };
}

/// `config!(("a", 1), ("b", [("c", Path("x"))]))`
#[macro_export]
macro_rules! config {
    ($(($k:expr, $($v:tt)+)),* $(,)?) => {
        $crate::configs::Config::new(vec![$(($k.to_string(), $crate::opt!($($v)+))),*])
    };
}

impl Options {
    pub fn kind(&self) -> &'static str {
        match self {
            Options::INT(_) => "INT",
            Options::FLOAT(_) => "FLOAT",
            Options::STR(_) => "STR",
            Options::BOOL(_) => "BOOL",
            Options::PATH(_) => "PATH",
            Options::CONFIG(_) => "CONFIG",
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Options::CONFIG(_))
    }

    pub fn is_same(&self, other: &Options) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Returns `val` expressed in the variant of `self`. Integers widen to floats
    /// and strings become paths, every other variant change is an error.
    pub fn coerce(&self, val: &Options) -> Result<Options> {
        match (self, val) {
            (a, b) if a.is_same(b) => Ok(b.clone()),
            (Options::FLOAT(_), Options::INT(i)) => Ok(Options::FLOAT(*i as f64)),
            (Options::PATH(_), Options::STR(s)) => Ok(Options::PATH(s.into())),
            (a, b) => Err(Error::msg(format!(
                "not the same variant, expected {} but got {}",
                a.kind(),
                b.kind()
            ))),
        }
    }

    /// Not allowed the change the variant, only updates what's inside
    pub fn update(&mut self, val: &Options) -> Result<()> {
        match (self, val) {
            (Options::CONFIG(a), Options::CONFIG(b)) => a.update(b),
            (a, b) => {
                *a = a.coerce(b)?;
                Ok(())
            }
        }
    }

    /// Parses a raw command line value into the variant of `self`
    pub fn parse_like(&self, raw: &str) -> Result<Options> {
        let raw = raw.trim();
        let parsed = match self {
            Options::INT(_) => Options::INT(raw.parse().with_context(|| format!("{raw:?} is not an integer"))?),
            Options::FLOAT(_) => Options::FLOAT(raw.parse().with_context(|| format!("{raw:?} is not a float"))?),
            Options::BOOL(_) => Options::BOOL(raw.parse().with_context(|| format!("{raw:?} is not a bool"))?),
            Options::STR(_) => Options::STR(unquote(raw).to_string()),
            Options::PATH(_) => Options::PATH(unquote(raw).into()),
            Options::CONFIG(_) => return Err(Error::msg("cannot assign a value to a whole section")),
        };
        Ok(parsed)
    }

    fn display_(&self, padding: usize, name: Option<&str>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pad = " ".repeat(padding);
        let name = name.unwrap_or("");
        match self {
            Options::INT(i) => writeln!(f, "{pad}{name}: {i}"),
            Options::FLOAT(i) => writeln!(f, "{pad}{name}: {i}"),
            Options::STR(i) => writeln!(f, "{pad}{name}: {i}"),
            Options::BOOL(i) => writeln!(f, "{pad}{name}: {i}"),
            Options::PATH(i) => writeln!(f, "{pad}{name}: {}", i.display()),
            Options::CONFIG(i) => {
                writeln!(f, "{pad}{name}:")?;
                i.display_(padding + 2, f)
            }
        }
    }
}

fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}

impl Display for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_(0, None, f)
    }
}

impl TryFrom<&Value> for Options {
    type Error = Error;
    fn try_from(value: &Value) -> Result<Self> {
        let opt = match value {
            Value::Bool(b) => Options::BOOL(*b),
            Value::Number(Number::Integer(i)) => Options::INT(*i as isize),
            Value::Number(Number::Float(x)) => Options::FLOAT(x.get()),
            Value::String(s) => Options::STR(s.clone()),
            Value::Char(c) => Options::STR(c.to_string()),
            Value::Option(Some(v)) => Options::try_from(&**v)?,
            Value::Map(map) => {
                let mut config = Config::default();
                for (k, v) in map.iter() {
                    let key = match k {
                        Value::String(s) => s.as_str(),
                        other => return Err(Error::msg(format!("config keys must be strings, found {other:?}"))),
                    };
                    let v = Options::try_from(v).with_context(|| format!("On key {key}"))?;
                    config.insert(key, v)?;
                }
                Options::CONFIG(config)
            }
            other => return Err(Error::msg(format!("unsupported config value {other:?}"))),
        };
        Ok(opt)
    }
}

/// An ordered tree of options, addressed by paths such as `image/height`
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
    map: HashMap<String, Options>,
    order: Vec<String>,
}

impl Config {
    pub fn valid_key(key: &str) -> bool {
        !key.is_empty() && !key.contains('/')
    }

    /// Constructs a Config with the given key, option pairs, ignores repeats
    /// and any names with "/" in them
    pub fn new(configs: Vec<(String, Options)>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for (name, config) in configs {
            if !map.contains_key(&name) && Self::valid_key(&name) {
                map.insert(name.clone(), config);
                order.push(name);
            }
        }
        Config { map, order }
    }

    /// Parses a RON map, e.g. `{"image": {"height": 64}}`
    pub fn from_ron(text: &str) -> Result<Self> {
        let value: Value = ron::from_str(text).context("Failed to parse config")?;
        match Options::try_from(&value)? {
            Options::CONFIG(c) => Ok(c),
            other => Err(Error::msg(format!("config root must be a map, found {}", other.kind()))),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_ron(&text).with_context(|| format!("In config {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert key inserts a new value into the config if there isn't one
    /// already, returning error. The order is appended last
    pub fn insert(&mut self, key: &str, val: Options) -> Result<()> {
        if !Self::valid_key(key) {
            Err(Error::msg(format!("invalid key {key:?}")))
        } else if self.map.contains_key(key) {
            Err(Error::msg(format!("already contains key {key}")))
        } else {
            self.order.push(key.to_string());
            self.map.insert(key.into(), val);
            Ok(())
        }
    }

    /// Overwrites values of self with those of other. Every key of other must
    /// already exist in self, sections are merged recursively
    pub fn update(&mut self, other: &Config) -> Result<()> {
        for (k, v) in other.iter() {
            let entry = self
                .map
                .get_mut(k)
                .ok_or_else(|| Error::msg(format!("unknown key {k}")))?;
            entry.update(v).with_context(|| format!("On key {k}"))?;
        }
        Ok(())
    }

    /// Applies a `path=value` command, the value is parsed as the variant
    /// already stored at path
    pub fn modify(&mut self, cmd: &str) -> Result<()> {
        let (path, raw) = cmd
            .split_once('=')
            .ok_or_else(|| Error::msg(format!("modify command {cmd:?} is not of the form path=value")))?;
        let path = path.trim();
        let entry = self
            .get_mut(path)
            .ok_or_else(|| Error::msg(format!("unknown key {path}")))?;
        *entry = entry.parse_like(raw).with_context(|| format!("On key {path}"))?;
        Ok(())
    }

    /// gets the value from the path, which can be recursive, ex: d/i, which assumes
    /// that there exists a Config variant at the key d, which also has a key i
    pub fn get(&self, path: &str) -> Option<&Options> {
        let mut keys = path.split('/');
        let mut k = self.map.get(keys.next()?)?;
        for s in keys {
            match k {
                Options::CONFIG(c) => k = c.map.get(s)?,
                _ => return None,
            }
        }
        Some(k)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Options> {
        let mut keys = path.split('/');
        let mut k = self.map.get_mut(keys.next()?)?;
        for s in keys {
            match k {
                Options::CONFIG(c) => k = c.map.get_mut(s)?,
                _ => return None,
            }
        }
        Some(k)
    }

    /// Typed lookup, errors if the key is missing or of another variant
    pub fn value<'a, T>(&'a self, path: &str) -> Result<T>
    where
        T: TryFrom<&'a Options, Error = Error>,
    {
        let opt = self
            .get(path)
            .ok_or_else(|| Error::msg(format!("Key {path} does not exist in config")))?;
        T::try_from(opt).with_context(|| format!("On key {path}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Options)> {
        self.order
            .iter()
            .filter_map(|k| self.map.get(k).map(|v| (k.as_str(), v)))
    }

    fn display_(&self, padding: usize, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (k, v) in self.iter() {
            v.display_(padding, Some(k), f)?;
        }
        Ok(())
    }
}

impl Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.display_(0, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> Config {
        config!(
            ("a", 1),
            ("b", 3.0),
            ("c", [("d", 1), ("f", "3"), ("g", Path("k")), ("ok", true)])
        )
    }

    #[test]
    fn config_macro_test() {
        let c = sample();
        assert_eq!(c.len(), 3);
        let d: isize = c.value("c/d").unwrap();
        assert_eq!(d, 1);
        let g: PathBuf = c.value("c/g").unwrap();
        assert_eq!(g, PathBuf::from("k"));
        assert!(c.get("c/missing").is_none());
        assert!(c.get("a/d").is_none());
        assert!(c.value::<bool>("a").is_err());
    }

    #[test]
    fn update_keeps_variants() {
        let mut c = sample();
        let other = Config::from_ron(r#"{"b": 2, "c": {"g": "other", "ok": false}}"#).unwrap();
        c.update(&other).unwrap();
        assert_eq!(c.get("b"), Some(&Options::FLOAT(2.0)));
        assert_eq!(c.get("c/g"), Some(&Options::PATH("other".into())));
        assert_eq!(c.get("c/ok"), Some(&Options::BOOL(false)));
        // untouched keys survive
        assert_eq!(c.get("c/f"), Some(&Options::STR("3".into())));

        let bad = Config::from_ron(r#"{"a": "one"}"#).unwrap();
        assert!(c.update(&bad).is_err());
        let unknown = Config::from_ron(r#"{"zzz": 1}"#).unwrap();
        assert!(c.update(&unknown).is_err());
    }

    #[test]
    fn modify_commands() {
        let mut c = sample();
        c.modify("c/d=42").unwrap();
        c.modify("b = 0.5").unwrap();
        c.modify("c/f=\"quoted\"").unwrap();
        assert_eq!(c.value::<isize>("c/d").unwrap(), 42);
        assert_eq!(c.value::<f64>("b").unwrap(), 0.5);
        assert_eq!(c.value::<String>("c/f").unwrap(), "quoted");

        assert!(c.modify("c/d=forty").is_err());
        assert!(c.modify("c=1").is_err());
        assert!(c.modify("nothing=1").is_err());
        assert!(c.modify("no equals sign").is_err());
    }

    #[test]
    fn usize_rejects_negative() {
        let c = config!(("n", -3));
        assert!(c.value::<usize>("n").is_err());
        assert_eq!(c.value::<isize>("n").unwrap(), -3);
    }

    #[test]
    fn display_nests() {
        let shown = sample().to_string();
        assert!(shown.contains("c:\n  d: 1"));
    }
}
