use std::convert::TryFrom;

/// Classification of a page's contents, stored as a single byte in the page
/// header (offset [`crate::header::PAGE_TYPE`]).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// A slotted page hosting variable-length records.
    Data = 0,
    /// A page belonging to a (currently external) index structure.
    Index = 1,
    /// A page that is part of the on-disk free-page list chain.
    FreeList = 2,
    /// An overflow page, holding a record too large for one slotted page.
    Overflow = 3,
}

impl From<PageType> for u8 {
    fn from(p: PageType) -> Self {
        p as u8
    }
}

impl TryFrom<u8> for PageType {
    type Error = u8;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(PageType::Data),
            1 => Ok(PageType::Index),
            2 => Ok(PageType::FreeList),
            3 => Ok(PageType::Overflow),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_from_u8() {
        assert_eq!(u8::from(PageType::Data), 0);
        assert_eq!(u8::from(PageType::Index), 1);
        assert_eq!(u8::from(PageType::FreeList), 2);
        assert_eq!(u8::from(PageType::Overflow), 3);

        assert_eq!(PageType::try_from(0).unwrap(), PageType::Data);
        assert_eq!(PageType::try_from(3).unwrap(), PageType::Overflow);
        assert_eq!(PageType::try_from(99), Err(99));
    }
}
