use std::cmp::Ordering;
use std::fmt;

/// Total order used by range checks. Doubles use `f64::total_cmp`, so NaN
/// sorts above every finite bound and is never inside a finite range.
pub trait Ordered: Clone + PartialEq + fmt::Debug {
    fn compare(&self, other: &Self) -> Ordering;
}

impl Ordered for bool {
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Ordered for i64 {
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl Ordered for f64 {
    fn compare(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Ordered for String {
    fn compare(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Validator<T> {
    /// Inclusive on both ends.
    Range { lower: T, upper: T },
    /// Ordered, de-duplicated, non-empty.
    OneOf(Vec<T>),
}

impl<T: Ordered> Validator<T> {
    pub fn range(lower: T, upper: T) -> Result<Self, String> {
        if lower.compare(&upper) == Ordering::Greater {
            return Err(format!("lower bound {lower:?} exceeds upper bound {upper:?}"));
        }
        Ok(Self::Range { lower, upper })
    }

    pub fn one_of<I>(options: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = T>,
    {
        let mut unique: Vec<T> = Vec::new();
        for option in options {
            if !unique.contains(&option) {
                unique.push(option);
            }
        }
        if unique.is_empty() {
            return Err("option set must be non-empty".to_string());
        }
        Ok(Self::OneOf(unique))
    }

    pub fn check(&self, value: &T) -> Result<(), String> {
        match self {
            Validator::Range { lower, upper } => {
                if value.compare(lower) == Ordering::Less
                    || value.compare(upper) == Ordering::Greater
                {
                    return Err(format!("{value:?} is outside [{lower:?}, {upper:?}]"));
                }
                Ok(())
            }
            Validator::OneOf(options) => {
                if options.iter().any(|option| option == value) {
                    return Ok(());
                }
                Err(format!("{value:?} is not one of {options:?}"))
            }
        }
    }

    pub fn bounds(&self) -> Option<(&T, &T)> {
        match self {
            Validator::Range { lower, upper } => Some((lower, upper)),
            Validator::OneOf(_) => None,
        }
    }

    pub fn options(&self) -> Option<&[T]> {
        match self {
            Validator::OneOf(options) => Some(options),
            Validator::Range { .. } => None,
        }
    }
}
