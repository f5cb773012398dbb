/// Largest value a single parameter may hold; digits past this clamp.
pub const PARAM_MAX: i32 = 0x3FFF_FFFF;

/// Parameter slots retained per sequence (parents and sub-parameters
/// combined); further parameters are dropped.
pub const MAX_PARAMS: usize = 32;

/// Value recorded for an omitted parameter, so handlers can distinguish
/// "absent" from an explicit 0.
pub const PARAM_OMITTED: i32 = -1;

/// Accumulated CSI/DCS parameters. Parameters separated by `;` form groups;
/// `:` attaches sub-parameters to the current group, so `38:2::10:20:30`
/// iterates as one slice `[38, 2, -1, 10, 20, 30]`.
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Flattened values, group after group.
    values: Vec<i32>,
    /// Length of each group (1 parent + its sub-parameters).
    lens: Vec<u8>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of parameter groups.
    pub fn len(&self) -> usize {
        self.lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lens.is_empty()
    }

    /// Iterate groups; each slice starts with the parent value followed by
    /// its sub-parameters.
    pub fn iter(&self) -> ParamsIter<'_> {
        ParamsIter {
            params: self,
            group: 0,
            offset: 0,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.lens.clear();
    }

    /// Finish the current parameter and start a new group (`;`).
    pub(crate) fn push(&mut self, value: i32) {
        if self.values.len() >= MAX_PARAMS {
            return;
        }
        self.values.push(value);
        self.lens.push(1);
    }

    /// Attach a sub-parameter to the current group (`:`). With no group open
    /// yet this starts one with an omitted parent.
    pub(crate) fn push_subparam(&mut self, value: i32) {
        if self.values.len() >= MAX_PARAMS {
            return;
        }
        if self.lens.is_empty() {
            self.push(PARAM_OMITTED);
            if self.values.len() >= MAX_PARAMS {
                return;
            }
        }
        self.values.push(value);
        *self.lens.last_mut().expect("group exists") += 1;
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a [i32];
    type IntoIter = ParamsIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ParamsIter<'a> {
    params: &'a Params,
    group: usize,
    offset: usize,
}

impl<'a> Iterator for ParamsIter<'a> {
    type Item = &'a [i32];

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.params.lens.get(self.group)? as usize;
        let slice = &self.params.values[self.offset..self.offset + len];
        self.group += 1;
        self.offset += len;
        Some(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_and_subparams_iterate_together() {
        let mut params = Params::new();
        params.push(38);
        params.push_subparam(2);
        params.push_subparam(PARAM_OMITTED);
        params.push_subparam(10);
        params.push_subparam(20);
        params.push_subparam(30);
        params.push(1);

        let groups: Vec<&[i32]> = params.iter().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], &[38, 2, -1, 10, 20, 30][..]);
        assert_eq!(groups[1], &[1][..]);
    }

    #[test]
    fn leading_subparam_opens_omitted_group() {
        let mut params = Params::new();
        params.push_subparam(5);
        let groups: Vec<&[i32]> = params.iter().collect();
        assert_eq!(groups, vec![&[-1, 5][..]]);
    }

    #[test]
    fn overflow_drops_excess_params() {
        let mut params = Params::new();
        for i in 0..(MAX_PARAMS as i32 + 10) {
            params.push(i);
        }
        assert_eq!(params.len(), MAX_PARAMS);
    }
}
