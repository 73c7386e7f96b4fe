// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Case-insensitive name matching for groups and outlets.

/// Returns the normalized (lowercased) form of a group or outlet name.
#[must_use]
pub fn normalize(name: &str) -> String {
    name.to_lowercase()
}

/// Returns true if two group names refer to the same group.
#[must_use]
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || normalize(a) == normalize(b)
}

/// Returns true if `outlet` belongs to `group`, i.e. the group name occurs
/// anywhere in the outlet name ignoring case.
///
/// # Examples
///
/// ```
/// use powerseq::types::name_contains;
///
/// assert!(name_contains("Living Room Lamp", "lamp"));
/// assert!(name_contains("Lamp2 Desk", "Lamp"));
/// assert!(!name_contains("Fridge", "Lamp"));
/// ```
#[must_use]
pub fn name_contains(outlet: &str, group: &str) -> bool {
    normalize(outlet).contains(&normalize(group))
}

/// Returns the key names are sorted by: lowercase with Latin accents
/// stripped, so `Éclairage` sorts among the `e`s.
///
/// Only the Latin-1 and Latin Extended-A letters are folded; other
/// characters keep their lowercase form and sort by code point.
#[must_use]
pub fn sort_key(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        match fold_accent(c) {
            Some(base) => key.push_str(base),
            None => key.push(c),
        }
    }
    key
}

fn fold_accent(c: char) -> Option<&'static str> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => "c",
        'ď' | 'đ' | 'ð' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => "e",
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => "g",
        'ĥ' | 'ħ' => "h",
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => "i",
        'ĵ' => "j",
        'ķ' => "k",
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => "l",
        'ñ' | 'ń' | 'ņ' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => "o",
        'œ' => "oe",
        'ŕ' | 'ŗ' | 'ř' => "r",
        'ś' | 'ŝ' | 'ş' | 'š' => "s",
        'ß' => "ss",
        'ţ' | 'ť' | 'ŧ' => "t",
        'þ' => "th",
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => "u",
        'ŵ' => "w",
        'ý' | 'ÿ' | 'ŷ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(base)
}
