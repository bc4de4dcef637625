//! Shared fixtures for unit tests.

use crate::database::Database;

/// Small two-image database every unit test starts from.
pub const BASE_DB: &str = "\
project: CHROMEBOOK
image_id:
  0: PROTO
  1: EVT
pattern:
- image_ids:
  - 0
  - 1
  encoding_scheme: base8192
  fields:
  - mainboard_field: 3
  - cpu_field: 3
  - storage_field: 0
  - comp_cls_1_field: 2
  - comp_cls_23_field: 2
encoded_fields:
  comp_cls_1_field:
    0:
      comp_cls_1: comp_1_1
    1:
      comp_cls_1: comp_1_2
  comp_cls_23_field:
    0:
      comp_cls_2: comp_2_1
      comp_cls_3: comp_3_1
    1:
      comp_cls_2: comp_2_2
      comp_cls_3: comp_3_2
  cpu_field:
    0:
      cpu: cpu_0
    1:
      cpu: cpu_1
  mainboard_field:
    0:
      mainboard: rev1
    1:
      mainboard: rev2
  storage_field:
    0:
      storage: []
components:
  comp_cls_1:
    items:
      comp_1_1:
        values:
          value: '1'
      comp_1_2:
        values:
          value: '2'
  comp_cls_2:
    items:
      comp_2_1:
        values:
          value: '1'
      comp_2_2:
        values:
          value: '2'
  comp_cls_3:
    items:
      comp_3_1:
        values:
          value: '1'
      comp_3_2:
        values:
          value: '2'
  cpu:
    items:
      cpu_0:
        values:
          model: x0
      cpu_1:
        values:
          model: x1
  mainboard:
    items:
      rev1:
        values:
          version: rev1
      rev2:
        values:
          version: rev2
  storage:
    items:
      storage_0:
        status: unqualified
        values:
          size: '64'
rules: []
";

/// `comp_1_2` renamed to a deprecated `comp_1_3`, a new `comp_1_2` taking over the name and
/// a new field selecting both.
pub const SCENARIO_REUSE_NAME_DB: &str = "\
project: CHROMEBOOK
image_id:
  0: PROTO
  1: EVT
pattern:
- image_ids:
  - 0
  - 1
  encoding_scheme: base8192
  fields:
  - mainboard_field: 3
  - cpu_field: 3
  - storage_field: 0
  - comp_cls_1_field: 2
  - comp_cls_23_field: 2
  - new_comp_cls_1_field: 1
encoded_fields:
  comp_cls_1_field:
    0:
      comp_cls_1: comp_1_1
    1:
      comp_cls_1: comp_1_3
  comp_cls_23_field:
    0:
      comp_cls_2: comp_2_1
      comp_cls_3: comp_3_1
    1:
      comp_cls_2: comp_2_2
      comp_cls_3: comp_3_2
  cpu_field:
    0:
      cpu: cpu_0
    1:
      cpu: cpu_1
  mainboard_field:
    0:
      mainboard: rev1
    1:
      mainboard: rev2
  new_comp_cls_1_field:
    0:
      comp_cls_1:
      - comp_1_1
      - comp_1_2
    1:
      comp_cls_1:
      - comp_1_1
      - comp_1_3
  storage_field:
    0:
      storage: []
components:
  comp_cls_1:
    items:
      comp_1_1:
        values:
          value: '1'
      comp_1_2:
        values:
          value: '3'
      comp_1_3:
        status: deprecated
        values:
          value: '2'
  comp_cls_2:
    items:
      comp_2_1:
        values:
          value: '1'
      comp_2_2:
        values:
          value: '2'
  comp_cls_3:
    items:
      comp_3_1:
        values:
          value: '1'
      comp_3_2:
        values:
          value: '2'
  cpu:
    items:
      cpu_0:
        values:
          model: x0
      cpu_1:
        values:
          model: x1
  mainboard:
    items:
      rev1:
        values:
          version: rev1
      rev2:
        values:
          version: rev2
  storage:
    items:
      storage_0:
        status: unqualified
        values:
          size: '64'
rules: []
";

pub fn load_base() -> Database {
    Database::load(BASE_DB).unwrap()
}

pub fn load_scenario_reuse_name() -> Database {
    Database::load(SCENARIO_REUSE_NAME_DB).unwrap()
}
