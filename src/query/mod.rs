//! Occlusion query tracking with temporal reuse
//!
//! Each camera owns one manager. Queries recorded while drawing frame N
//! are downloaded at the end of the frame and answered during frame N+1,
//! letting the depth prepass skip full shading for geometry that was
//! occluded a frame ago.

use crate::device::{CommandBufferHandle, DeviceResult, QueryPoolHandle, RenderDevice};
use crate::registry::EntityId;
use std::collections::HashMap;

pub struct OcclusionQueryManager {
    pool: QueryPoolHandle,
    max_entities: u32,
    /// High-water mark of draw indices used this frame
    max_queried: u32,
    current_entity_to_draw_index: HashMap<EntityId, u32>,
    /// Mapping from the last successfully downloaded frame. Together
    /// with `results` it always describes one self-consistent frame;
    /// the two are replaced only after a successful download.
    previous_entity_to_draw_index: HashMap<EntityId, u32>,
    /// Passed-sample counts per draw index of the downloaded frame
    results: Vec<u64>,
    query_recorded: bool,
    query_downloaded: bool,
}

impl OcclusionQueryManager {
    pub fn new<D: RenderDevice>(device: &mut D, max_entities: u32) -> DeviceResult<Self> {
        let pool = device.create_query_pool(max_entities)?;
        Ok(Self {
            pool,
            max_entities,
            max_queried: 0,
            current_entity_to_draw_index: HashMap::new(),
            previous_entity_to_draw_index: HashMap::new(),
            results: Vec::new(),
            query_recorded: false,
            query_downloaded: false,
        })
    }

    /// Reset the pool before any draws are recorded for this frame
    pub fn reset<D: RenderDevice>(&mut self, device: &mut D, command_buffer: CommandBufferHandle) {
        device.cmd_reset_query_pool(command_buffer, self.pool, 0, self.max_entities);
        self.max_queried = 0;
        self.current_entity_to_draw_index.clear();
        self.query_recorded = false;
        self.query_downloaded = false;
    }

    /// Open an occlusion query scoped to one draw call
    pub fn begin_query<D: RenderDevice>(
        &mut self,
        device: &mut D,
        command_buffer: CommandBufferHandle,
        entity_id: EntityId,
        draw_index: u32,
    ) {
        if draw_index >= self.max_entities {
            panic!(
                "draw index {} out of query pool range {}",
                draw_index, self.max_entities
            );
        }
        device.cmd_begin_query(command_buffer, self.pool, draw_index);
        self.current_entity_to_draw_index.insert(entity_id, draw_index);
        self.query_recorded = true;
    }

    /// Close the query opened for `draw_index`
    pub fn end_query<D: RenderDevice>(
        &mut self,
        device: &mut D,
        command_buffer: CommandBufferHandle,
        draw_index: u32,
    ) {
        device.cmd_end_query(command_buffer, self.pool, draw_index);
        self.max_queried = self.max_queried.max(draw_index + 1);
    }

    /// Fetch this frame's query results and make them the answers for
    /// next frame.
    ///
    /// Skipped when nothing was queried. On a device failure the
    /// previous mapping stays in place and the failure is logged;
    /// visibility answers degrade to the stale frame rather than to
    /// inconsistent data, and there is no retry within the frame.
    pub fn download<D: RenderDevice>(&mut self, device: &D) {
        if !self.query_recorded || self.max_queried == 0 {
            return;
        }

        match device.get_query_results(self.pool, 0, self.max_queried) {
            Ok(raw) => {
                // Raw 0 means the result never became available; any
                // other value v encodes an available count of v - 1.
                self.results = raw
                    .iter()
                    .map(|&value| if value > 0 { value - 1 } else { 0 })
                    .collect();
                self.previous_entity_to_draw_index =
                    std::mem::take(&mut self.current_entity_to_draw_index);
                self.query_downloaded = true;
            }
            Err(e) => {
                log::warn!("occlusion query download failed: {}", e);
            }
        }
    }

    /// Whether any fragments of this entity passed the depth test in the
    /// last downloaded frame.
    ///
    /// An entity that was never queried answers `true` so that new
    /// geometry is drawn in full on its first frame.
    pub fn is_entity_visible(&self, entity_id: EntityId) -> bool {
        match self.previous_entity_to_draw_index.get(&entity_id) {
            Some(&draw_index) => match self.results.get(draw_index as usize) {
                Some(&count) => count > 0,
                None => true,
            },
            None => true,
        }
    }

    pub fn query_downloaded(&self) -> bool {
        self.query_downloaded
    }

    pub fn max_queried(&self) -> u32 {
        self.max_queried
    }

    /// Release the GPU query pool at teardown
    pub fn destroy<D: RenderDevice>(&mut self, device: &mut D) {
        device.destroy_query_pool(self.pool);
    }
}
